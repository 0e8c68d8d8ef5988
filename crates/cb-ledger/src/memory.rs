//! In-memory CarbonNFT chain.
//!
//! Reproduces the deployed contract's observable behavior — dense counters,
//! owner-gated minting, the per-token retired latch, transfer blocking, and
//! the exact revert reason strings — so the rest of the workspace can be
//! tested without a node. Fault injection hooks let tests exercise the
//! partial-failure paths of the mutation orchestrator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use cb_api_types::AccountAddress;

use crate::{
    BindingError, CarbonLedger, LedgerBinder, LedgerError, PendingTx, ProjectData, TxReceipt,
};

/// Revert reason strings as the deployed contract emits them.
pub const REASON_ONLY_OWNER_CAN_RETIRE: &str = "Only owner can retire";
pub const REASON_ALREADY_RETIRED: &str = "Token already retired";
pub const REASON_RETIRED_TRANSFER: &str = "Token is retired and cannot be transferred";
pub const REASON_MISSING_TOKEN: &str = "Token does not exist";
pub const REASON_MISSING_PROJECT: &str = "Project does not exist";
pub const REASON_NOT_CONTRACT_OWNER: &str = "OwnableUnauthorizedAccount";
pub const REASON_INCORRECT_FROM: &str = "ERC721IncorrectOwner";

#[derive(Debug, Clone)]
struct TokenState {
    owner: AccountAddress,
    project_id: u64,
    retired: bool,
}

#[derive(Debug, Default)]
struct ChainState {
    projects: Vec<ProjectData>,
    tokens: Vec<TokenState>,
    bridged: HashSet<String>,
    tx_seq: u64,
    retires_applied: u32,
    fail_next_mint_batch: bool,
    fail_retire_after: Option<u32>,
    fail_reads: bool,
    fail_next_confirm: Option<String>,
}

impl ChainState {
    fn next_tx(&mut self) -> PendingTx {
        self.tx_seq += 1;
        PendingTx {
            tx_hash: format!("memtx-{}", self.tx_seq),
        }
    }

    fn reads(&self) -> Result<(), LedgerError> {
        if self.fail_reads {
            return Err(LedgerError::Transport("injected read failure".to_string()));
        }
        Ok(())
    }

    fn token(&self, token_id: u64) -> Result<&TokenState, LedgerError> {
        self.tokens
            .get(usize::try_from(token_id).map_err(|_| revert(REASON_MISSING_TOKEN))?)
            .ok_or_else(|| revert(REASON_MISSING_TOKEN))
    }
}

fn revert(reason: &str) -> LedgerError {
    LedgerError::Reverted {
        reason: reason.to_string(),
    }
}

/// A simulated CarbonNFT deployment. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryChain {
    state: Arc<Mutex<ChainState>>,
    contract_owner: AccountAddress,
}

impl MemoryChain {
    /// Deploy a fresh chain whose contract owner is `contract_owner`.
    pub fn new(contract_owner: AccountAddress) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState::default())),
            contract_owner,
        }
    }

    pub fn contract_owner(&self) -> &AccountAddress {
        &self.contract_owner
    }

    /// Make the next `mint_batch` submission revert.
    pub fn fail_next_mint_batch(&self) {
        self.lock().fail_next_mint_batch = true;
    }

    /// Allow `n` further successful retires, then revert every later one.
    pub fn fail_retire_after(&self, n: u32) {
        let mut state = self.lock();
        let base = state.retires_applied;
        state.fail_retire_after = Some(base + n);
    }

    /// Make every read fail with a transport error until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make the next `confirm` revert with `reason`.
    pub fn fail_next_confirm(&self, reason: &str) {
        self.lock().fail_next_confirm = Some(reason.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LedgerBinder for MemoryChain {
    type Handle = MemoryLedger;

    fn bind(&self, account: &AccountAddress) -> Result<MemoryLedger, BindingError> {
        if account.as_str().is_empty() {
            return Err(BindingError {
                account: account.to_string(),
                reason: "empty account".to_string(),
            });
        }
        Ok(MemoryLedger {
            chain: self.clone(),
            account: account.clone(),
        })
    }
}

/// A [`CarbonLedger`] handle over a [`MemoryChain`], pinned to one caller.
#[derive(Clone)]
pub struct MemoryLedger {
    chain: MemoryChain,
    account: AccountAddress,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl CarbonLedger for MemoryLedger {
    fn account(&self) -> &AccountAddress {
        &self.account
    }

    async fn project_counter(&self) -> Result<u64, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        Ok(state.projects.len() as u64)
    }

    async fn token_counter(&self) -> Result<u64, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        Ok(state.tokens.len() as u64)
    }

    async fn project_data(&self, project_id: u64) -> Result<ProjectData, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        state
            .projects
            .get(project_id as usize)
            .cloned()
            .ok_or_else(|| revert(REASON_MISSING_PROJECT))
    }

    async fn owner_of(&self, token_id: u64) -> Result<AccountAddress, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        Ok(state.token(token_id)?.owner.clone())
    }

    async fn is_retired(&self, token_id: u64) -> Result<bool, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        Ok(state.token(token_id)?.retired)
    }

    async fn token_project(&self, token_id: u64) -> Result<u64, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        Ok(state.token(token_id)?.project_id)
    }

    async fn is_bridged(&self, registry_project_id: &str) -> Result<bool, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        Ok(state.bridged.contains(registry_project_id.trim()))
    }

    async fn token_uri(&self, token_id: u64) -> Result<String, LedgerError> {
        let state = self.chain.lock();
        state.reads()?;
        let token = state.token(token_id)?;
        let project = state
            .projects
            .get(token.project_id as usize)
            .ok_or_else(|| revert(REASON_MISSING_PROJECT))?;
        Ok(format!("ipfs://{}", project.content_pointer))
    }

    async fn create_project(&self, data: &ProjectData) -> Result<PendingTx, LedgerError> {
        let mut state = self.chain.lock();
        // The contract does not enforce registry-id uniqueness; the
        // orchestrator's is_bridged precondition is the only guard.
        state.projects.push(data.clone());
        state
            .bridged
            .insert(data.registry_project_id.trim().to_string());
        Ok(state.next_tx())
    }

    async fn mint_nft(
        &self,
        to: &AccountAddress,
        content_pointer: &str,
        location: &str,
        name: &str,
    ) -> Result<PendingTx, LedgerError> {
        let mut state = self.chain.lock();
        if self.account != self.chain.contract_owner {
            return Err(revert(REASON_NOT_CONTRACT_OWNER));
        }
        // Single mint creates a dedicated single-token project, as the
        // contract's mintNFT does.
        let project_id = state.projects.len() as u64;
        state.projects.push(ProjectData {
            registry_project_id: String::new(),
            content_pointer: content_pointer.to_string(),
            location: location.to_string(),
            name: name.to_string(),
        });
        state.tokens.push(TokenState {
            owner: to.clone(),
            project_id,
            retired: false,
        });
        Ok(state.next_tx())
    }

    async fn mint_batch(
        &self,
        to: &AccountAddress,
        project_id: u64,
        amount: u32,
    ) -> Result<PendingTx, LedgerError> {
        let mut state = self.chain.lock();
        if self.account != self.chain.contract_owner {
            return Err(revert(REASON_NOT_CONTRACT_OWNER));
        }
        if state.projects.get(project_id as usize).is_none() {
            return Err(revert(REASON_MISSING_PROJECT));
        }
        if state.fail_next_mint_batch {
            state.fail_next_mint_batch = false;
            return Err(revert("injected mint failure"));
        }
        for _ in 0..amount {
            state.tokens.push(TokenState {
                owner: to.clone(),
                project_id,
                retired: false,
            });
        }
        Ok(state.next_tx())
    }

    async fn retire(&self, token_id: u64) -> Result<PendingTx, LedgerError> {
        let mut state = self.chain.lock();
        let token = state.token(token_id)?.clone();
        if token.owner != self.account {
            return Err(revert(REASON_ONLY_OWNER_CAN_RETIRE));
        }
        if token.retired {
            return Err(revert(REASON_ALREADY_RETIRED));
        }
        if let Some(limit) = state.fail_retire_after {
            if state.retires_applied >= limit {
                return Err(revert("injected retire failure"));
            }
        }
        state.tokens[token_id as usize].retired = true;
        state.retires_applied += 1;
        Ok(state.next_tx())
    }

    async fn transfer_from(
        &self,
        from: &AccountAddress,
        to: &AccountAddress,
        token_id: u64,
    ) -> Result<PendingTx, LedgerError> {
        let mut state = self.chain.lock();
        let token = state.token(token_id)?.clone();
        if token.retired {
            return Err(revert(REASON_RETIRED_TRANSFER));
        }
        if token.owner != *from || token.owner != self.account {
            return Err(revert(REASON_INCORRECT_FROM));
        }
        state.tokens[token_id as usize].owner = to.clone();
        Ok(state.next_tx())
    }

    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, LedgerError> {
        // State is applied at submission; confirmation is immediate.
        let mut state = self.chain.lock();
        if let Some(reason) = state.fail_next_confirm.take() {
            return Err(revert(&reason));
        }
        Ok(TxReceipt {
            tx_hash: tx.tx_hash.clone(),
        })
    }
}
