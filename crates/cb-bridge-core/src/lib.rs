//! Application core of the carbon bridge.
//!
//! Everything here is UI-agnostic: the wallet session lifecycle, the
//! read-side aggregation of on-chain state into a [`ChainView`], and the
//! write-side orchestration of bridge, mint, retire, and transfer flows.
//! The browser front end and the tests drive the same code paths through the
//! [`cb_ledger::CarbonLedger`] seam.

mod aggregate;
mod errors;
mod mutate;
mod session;

pub use aggregate::{ChainView, ProjectSummary, ViewSlot, ViewTicket, aggregate};
pub use errors::{AggregationError, MutationError, RetireBatchError, SessionError};
pub use mutate::{
    bridge_and_mint, mint_for_project, mint_single, retire_batch, retire_token, transfer_token,
};
pub use session::{SessionHandle, SessionManager, WalletProvider};
