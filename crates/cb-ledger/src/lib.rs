//! The consumed surface of the deployed CarbonNFT contract.
//!
//! [`CarbonLedger`] is the seam between the application and whatever actually
//! executes the contract: an EVM node over JSON-RPC, an injected browser
//! wallet, or the in-memory chain in [`memory`] used by tests. Mutating calls
//! return a [`PendingTx`]; nothing is durable until [`CarbonLedger::confirm`]
//! has returned a receipt for it.

pub mod memory;

use cb_api_types::AccountAddress;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The ledger rejected the call; `reason` is the contract-provided revert
    /// string when one was available.
    #[error("reverted: {reason}")]
    Reverted { reason: String },

    #[error("could not decode ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// The revert reason, if this error is a revert.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            LedgerError::Reverted { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("cannot bind account {account}: {reason}")]
pub struct BindingError {
    pub account: String,
    pub reason: String,
}

/// A submitted but not yet confirmed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTx {
    pub tx_hash: String,
}

/// Proof that a transaction was included and did not revert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
}

/// The on-chain project tuple as `getProjectData` returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectData {
    pub registry_project_id: String,
    pub content_pointer: String,
    pub location: String,
    pub name: String,
}

/// An authenticated handle to the CarbonNFT contract, pinned to one caller
/// account. Reads are free; mutations are submitted from that account.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait CarbonLedger {
    /// The account this handle submits transactions as.
    fn account(&self) -> &AccountAddress;

    async fn project_counter(&self) -> Result<u64, LedgerError>;
    async fn token_counter(&self) -> Result<u64, LedgerError>;
    async fn project_data(&self, project_id: u64) -> Result<ProjectData, LedgerError>;
    async fn owner_of(&self, token_id: u64) -> Result<AccountAddress, LedgerError>;
    async fn is_retired(&self, token_id: u64) -> Result<bool, LedgerError>;
    async fn token_project(&self, token_id: u64) -> Result<u64, LedgerError>;
    async fn is_bridged(&self, registry_project_id: &str) -> Result<bool, LedgerError>;
    async fn token_uri(&self, token_id: u64) -> Result<String, LedgerError>;

    async fn create_project(&self, data: &ProjectData) -> Result<PendingTx, LedgerError>;
    async fn mint_nft(
        &self,
        to: &AccountAddress,
        content_pointer: &str,
        location: &str,
        name: &str,
    ) -> Result<PendingTx, LedgerError>;
    async fn mint_batch(
        &self,
        to: &AccountAddress,
        project_id: u64,
        amount: u32,
    ) -> Result<PendingTx, LedgerError>;
    async fn retire(&self, token_id: u64) -> Result<PendingTx, LedgerError>;
    async fn transfer_from(
        &self,
        from: &AccountAddress,
        to: &AccountAddress,
        token_id: u64,
    ) -> Result<PendingTx, LedgerError>;

    /// Await one confirmation for a previously submitted transaction.
    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, LedgerError>;
}

/// Constructs [`CarbonLedger`] handles for accounts.
///
/// Each call produces a fresh handle pinned to the given account; binders do
/// not cache handles across binds, so an account switch can never leak a
/// stale signer.
pub trait LedgerBinder {
    type Handle: CarbonLedger;

    fn bind(&self, account: &AccountAddress) -> Result<Self::Handle, BindingError>;
}
