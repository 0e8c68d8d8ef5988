//! End-to-end flows against the in-memory chain.

use cb_api_types::{AccountAddress, RegistryEntry};
use cb_bridge_core::{
    MutationError, RetireBatchError, SessionError, SessionManager, ViewSlot, WalletProvider,
    aggregate, bridge_and_mint, mint_for_project, mint_single, retire_batch, retire_token,
    transfer_token,
};
use cb_ledger::memory::{MemoryChain, REASON_ALREADY_RETIRED, REASON_RETIRED_TRANSFER};
use cb_ledger::{CarbonLedger, LedgerBinder};

fn caller() -> AccountAddress {
    // Also the contract owner: the account that deployed the contract drives
    // the bridge, as in the reference deployment.
    AccountAddress::new("0xcafe")
}

fn entry(registry_id: &str, amount: u32) -> RegistryEntry {
    RegistryEntry {
        registry_project_id: registry_id.to_string(),
        content_pointer: format!("bafy-{registry_id}"),
        location: "Kenya".to_string(),
        project_name: format!("Project {registry_id}"),
        amount,
        retired_by: None,
        retired_date: None,
    }
}

#[tokio::test]
async fn bridging_creates_one_project_and_mints_the_full_amount() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();

    let before = ledger.project_counter().await.unwrap();
    let project_id = bridge_and_mint(&ledger, &entry("1001", 5), &caller())
        .await
        .unwrap();
    assert_eq!(project_id, before);

    let view = aggregate(&ledger).await.unwrap();
    assert_eq!(view.projects.len(), 1);
    assert_eq!(view.projects[0].registry_project_id, "1001");
    let mine: Vec<_> = view.my_tokens().collect();
    assert_eq!(mine.len(), 5);
    assert!(mine.iter().all(|t| t.project_id == project_id && !t.retired));
    assert!(ledger.is_bridged("1001").await.unwrap());
}

#[tokio::test]
async fn bridging_twice_is_rejected_before_any_transaction() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();
    bridge_and_mint(&ledger, &entry("1001", 5), &caller())
        .await
        .unwrap();

    let err = bridge_and_mint(&ledger, &entry("1001", 5), &caller())
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::AlreadyBridged { .. }));
    assert_eq!(ledger.project_counter().await.unwrap(), 1);
    assert_eq!(ledger.token_counter().await.unwrap(), 5);
}

#[tokio::test]
async fn a_failed_mint_leaves_a_state_the_recovery_mint_completes() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();

    chain.fail_next_mint_batch();
    let err = bridge_and_mint(&ledger, &entry("1001", 5), &caller())
        .await
        .unwrap_err();
    let project_id = match err {
        MutationError::MintFailed {
            project_id: Some(id),
            ..
        } => id,
        other => panic!("expected recoverable MintFailed, got {other:?}"),
    };

    // The project landed; no tokens did.
    assert_eq!(ledger.project_counter().await.unwrap(), 1);
    assert_eq!(ledger.token_counter().await.unwrap(), 0);
    assert!(ledger.is_bridged("1001").await.unwrap());

    mint_for_project(&ledger, project_id, 5, &caller())
        .await
        .unwrap();
    assert_eq!(ledger.token_counter().await.unwrap(), 5);
}

#[tokio::test]
async fn retire_batch_checks_bounds_locally_and_walks_ascending_ids() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();
    let other = AccountAddress::new("0xbbb");

    // My tokens 0..3 and 5, someone else's 3..5; retire 1 and 5 up front so
    // my active holding is exactly [0, 2].
    bridge_and_mint(&ledger, &entry("1001", 3), &caller())
        .await
        .unwrap();
    mint_for_project(&ledger, 0, 2, &other).await.unwrap();
    mint_for_project(&ledger, 0, 1, &caller()).await.unwrap();
    for token_id in [1, 5] {
        let tx = ledger.retire(token_id).await.unwrap();
        ledger.confirm(&tx).await.unwrap();
    }

    let view = aggregate(&ledger).await.unwrap();
    assert_eq!(view.my_active_token_ids(0), vec![0, 2]);

    // Over-count is rejected with nothing submitted.
    let err = retire_batch(&ledger, &view, 0, 3).await.unwrap_err();
    assert!(matches!(
        err,
        RetireBatchError::InvalidCount {
            requested: 3,
            active: 2
        }
    ));
    assert!(!ledger.is_retired(0).await.unwrap());

    assert_eq!(retire_batch(&ledger, &view, 0, 2).await.unwrap(), 2);
    assert!(ledger.is_retired(0).await.unwrap());
    assert!(ledger.is_retired(2).await.unwrap());
    // Untouched: the other wallet's tokens stay active, 5 stays retired.
    assert!(!ledger.is_retired(3).await.unwrap());
    assert!(!ledger.is_retired(4).await.unwrap());
    assert!(ledger.is_retired(5).await.unwrap());
}

#[tokio::test]
async fn retire_batch_reports_how_far_it_got() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();
    bridge_and_mint(&ledger, &entry("1001", 3), &caller())
        .await
        .unwrap();

    let view = aggregate(&ledger).await.unwrap();
    chain.fail_retire_after(1);
    let err = retire_batch(&ledger, &view, 0, 3).await.unwrap_err();
    match err {
        RetireBatchError::Aborted { retired, .. } => assert_eq!(retired, 1),
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert!(ledger.is_retired(0).await.unwrap());
    assert!(!ledger.is_retired(1).await.unwrap());
}

#[tokio::test]
async fn single_mints_are_owner_gated() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();
    let holder = AccountAddress::new("0xaaa");

    mint_single(&ledger, &holder, "bafy-solo", "Peru", "Rainforest")
        .await
        .unwrap();
    assert_eq!(ledger.token_counter().await.unwrap(), 1);
    assert_eq!(ledger.owner_of(0).await.unwrap(), holder);

    let outsider = chain.bind(&holder).unwrap();
    let err = mint_single(&outsider, &holder, "bafy-solo", "Peru", "Rainforest")
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Ledger(_)));
    assert_eq!(ledger.token_counter().await.unwrap(), 1);
}

#[tokio::test]
async fn transfers_move_active_tokens_and_reject_retired_ones() {
    let chain = MemoryChain::new(caller());
    let owner_ledger = chain.bind(&caller()).unwrap();
    let holder = AccountAddress::new("0xaaa");
    let recipient = AccountAddress::new("0xbbb");
    bridge_and_mint(&owner_ledger, &entry("1001", 2), &holder)
        .await
        .unwrap();

    let ledger = chain.bind(&holder).unwrap();
    transfer_token(&ledger, &holder, &recipient, 0).await.unwrap();
    assert_eq!(ledger.owner_of(0).await.unwrap(), recipient);

    retire_token(&ledger, 1).await.unwrap();
    let err = transfer_token(&ledger, &holder, &recipient, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::TransferBlocked));
    assert_eq!(ledger.owner_of(1).await.unwrap(), holder);
}

#[tokio::test]
async fn reverts_surfacing_at_confirmation_classify_like_submission_ones() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();
    bridge_and_mint(&ledger, &entry("1001", 2), &caller())
        .await
        .unwrap();

    // A node can accept the submission and only report the revert in the
    // receipt; the caller must still see the specific error.
    chain.fail_next_confirm(REASON_ALREADY_RETIRED);
    let err = retire_token(&ledger, 0).await.unwrap_err();
    assert!(matches!(err, MutationError::AlreadyRetired));

    chain.fail_next_confirm(REASON_RETIRED_TRANSFER);
    let err = transfer_token(&ledger, &caller(), &AccountAddress::new("0xbbb"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::TransferBlocked));
}

#[tokio::test]
async fn a_failed_aggregation_pass_leaves_no_view_behind() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();
    bridge_and_mint(&ledger, &entry("1001", 2), &caller())
        .await
        .unwrap();

    let mut slot = ViewSlot::new();
    let ticket = slot.begin();
    let view = aggregate(&ledger).await.unwrap();
    assert!(slot.commit(ticket, view));

    // The chain goes unreachable mid-session: the pass fails and the
    // previously committed view is dropped rather than kept actionable.
    chain.fail_reads(true);
    let failed_ticket = slot.begin();
    assert!(aggregate(&ledger).await.is_err());
    slot.invalidate();
    assert!(slot.view().is_none());

    // Nothing from before the failure can land afterwards either.
    chain.fail_reads(false);
    let late = aggregate(&ledger).await.unwrap();
    assert!(!slot.commit(failed_ticket, late));
}

/// Provider whose authorized account is swapped mid-test.
struct SwitchingProvider;

#[async_trait::async_trait]
impl WalletProvider for SwitchingProvider {
    async fn existing_accounts(&self) -> Result<Vec<AccountAddress>, SessionError> {
        Ok(vec![])
    }

    async fn request_accounts(&self) -> Result<Vec<AccountAddress>, SessionError> {
        Ok(vec![AccountAddress::new("0xaaa")])
    }
}

#[tokio::test]
async fn a_view_aggregated_before_an_account_switch_never_lands() {
    let chain = MemoryChain::new(caller());
    let ledger = chain.bind(&caller()).unwrap();
    bridge_and_mint(&ledger, &entry("1001", 2), &AccountAddress::new("0xaaa"))
        .await
        .unwrap();
    mint_for_project(&ledger, 0, 2, &AccountAddress::new("0xbbb"))
        .await
        .unwrap();

    let mut sessions = SessionManager::new(SwitchingProvider, chain.clone());
    let mut slot = ViewSlot::new();

    let first = sessions.request_connection().await.unwrap();
    let stale_ticket = slot.begin();
    let stale_view = aggregate(&first.ledger).await.unwrap();

    // The wallet switches accounts while the first aggregation is in flight.
    let second = sessions
        .accounts_changed(&[AccountAddress::new("0xbbb")])
        .unwrap()
        .unwrap();
    assert!(second.generation > first.generation);
    slot.invalidate();

    let fresh_ticket = slot.begin();
    let fresh_view = aggregate(&second.ledger).await.unwrap();
    assert!(slot.commit(fresh_ticket, fresh_view));
    assert!(!slot.commit(stale_ticket, stale_view));

    let committed = slot.view().unwrap();
    assert_eq!(committed.wallet, AccountAddress::new("0xbbb"));
    let mine: Vec<u64> = committed.my_tokens().map(|t| t.token_id).collect();
    assert_eq!(mine, vec![2, 3]);
}
