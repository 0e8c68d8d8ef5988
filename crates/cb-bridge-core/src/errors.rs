//! User-facing error taxonomy.
//!
//! Ledger rejections arrive as [`LedgerError::Reverted`] with the contract's
//! reason string; [`classify_ledger_error`] maps the known CarbonNFT reasons
//! onto distinct variants so callers can render them without string matching.

use cb_ledger::{BindingError, LedgerError, memory};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no injected wallet provider is available")]
    ProviderUnavailable,

    #[error("the user rejected the connection request")]
    Rejected,

    #[error("wallet provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Binding(#[from] BindingError),
}

#[derive(Debug, Error)]
#[error("could not aggregate on-chain state: {0}")]
pub struct AggregationError(#[from] pub LedgerError);

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("registry project {registry_project_id} is already bridged")]
    AlreadyBridged { registry_project_id: String },

    /// The project exists on chain but its tokens were not minted.
    /// `project_id` is `None` only when the new project's id could not be
    /// read back; otherwise `mint_for_project` can complete the bridge.
    #[error("project created but minting failed: {cause}")]
    MintFailed {
        project_id: Option<u64>,
        cause: LedgerError,
    },

    #[error("caller does not own this token")]
    NotOwner,

    #[error("token is already retired")]
    AlreadyRetired,

    #[error("retired tokens cannot be transferred")]
    TransferBlocked,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Error)]
pub enum RetireBatchError {
    #[error("cannot retire {requested} tokens: {active} active tokens held")]
    InvalidCount { requested: u32, active: u32 },

    #[error("retire batch stopped after {retired} tokens: {cause}")]
    Aborted { retired: u32, cause: MutationError },
}

/// Map known CarbonNFT revert reasons onto taxonomy variants; anything
/// unrecognized passes through untouched.
pub(crate) fn classify_ledger_error(err: LedgerError) -> MutationError {
    match err.revert_reason() {
        Some(memory::REASON_ONLY_OWNER_CAN_RETIRE) => MutationError::NotOwner,
        Some(memory::REASON_ALREADY_RETIRED) => MutationError::AlreadyRetired,
        Some(memory::REASON_RETIRED_TRANSFER) => MutationError::TransferBlocked,
        Some(reason) if reason.starts_with(memory::REASON_INCORRECT_FROM) => {
            MutationError::NotOwner
        }
        _ => MutationError::Ledger(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverted(reason: &str) -> LedgerError {
        LedgerError::Reverted {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn known_reasons_map_to_taxonomy_variants() {
        assert!(matches!(
            classify_ledger_error(reverted("Only owner can retire")),
            MutationError::NotOwner
        ));
        assert!(matches!(
            classify_ledger_error(reverted("Token already retired")),
            MutationError::AlreadyRetired
        ));
        assert!(matches!(
            classify_ledger_error(reverted("Token is retired and cannot be transferred")),
            MutationError::TransferBlocked
        ));
    }

    #[test]
    fn unknown_reasons_pass_through_with_the_reason_preserved() {
        let err = classify_ledger_error(reverted("Project does not exist"));
        match err {
            MutationError::Ledger(inner) => {
                assert_eq!(inner.revert_reason(), Some("Project does not exist"));
            }
            other => panic!("expected Ledger, got {other:?}"),
        }
    }
}
