//! Write-side orchestration.
//!
//! Every mutation here submits and then confirms before reporting success;
//! nothing is considered done on submission alone. Multi-transaction flows
//! (bridge, retire batch) report exactly how far they got when a later step
//! fails, because the earlier confirmed transactions are permanent.

use cb_api_types::{AccountAddress, RegistryEntry};
use cb_ledger::{CarbonLedger, LedgerError, PendingTx, ProjectData};
use tracing::{info, warn};

use crate::aggregate::ChainView;
use crate::errors::{MutationError, RetireBatchError, classify_ledger_error};

async fn settle<L: CarbonLedger>(ledger: &L, tx: PendingTx) -> Result<(), LedgerError> {
    ledger.confirm(&tx).await?;
    Ok(())
}

/// Bridge one registry entry: create its on-chain project, then mint the
/// entry's full amount to `dest`. Returns the new project id.
///
/// The two transactions confirm independently. When the create lands but the
/// mint fails, the returned [`MutationError::MintFailed`] carries the project
/// id so [`mint_for_project`] can finish the job without re-creating the
/// project.
pub async fn bridge_and_mint<L: CarbonLedger>(
    ledger: &L,
    entry: &RegistryEntry,
    dest: &AccountAddress,
) -> Result<u64, MutationError> {
    if ledger.is_bridged(&entry.registry_project_id).await? {
        return Err(MutationError::AlreadyBridged {
            registry_project_id: entry.registry_project_id.clone(),
        });
    }

    let tx = ledger
        .create_project(&ProjectData {
            registry_project_id: entry.registry_project_id.clone(),
            content_pointer: entry.content_pointer.clone(),
            location: entry.location.clone(),
            name: entry.project_name.clone(),
        })
        .await?;
    settle(ledger, tx).await?;
    info!(registry_project_id = %entry.registry_project_id, "project created");

    // The project is now permanent; everything below must report it.
    let project_id = match ledger.project_counter().await {
        Ok(counter) => match counter.checked_sub(1) {
            Some(id) => id,
            None => {
                return Err(MutationError::MintFailed {
                    project_id: None,
                    cause: LedgerError::Decode(
                        "project counter did not advance after create".to_string(),
                    ),
                });
            }
        },
        Err(cause) => {
            warn!(%cause, "created project but could not read its id back");
            return Err(MutationError::MintFailed {
                project_id: None,
                cause,
            });
        }
    };

    mint_for_project(ledger, project_id, entry.amount, dest).await?;
    Ok(project_id)
}

/// Mint `amount` tokens of an existing project to `dest`. Also the recovery
/// path for a bridge whose create landed but whose mint did not.
pub async fn mint_for_project<L: CarbonLedger>(
    ledger: &L,
    project_id: u64,
    amount: u32,
    dest: &AccountAddress,
) -> Result<(), MutationError> {
    let minted = match ledger.mint_batch(dest, project_id, amount).await {
        Ok(tx) => settle(ledger, tx).await,
        Err(e) => Err(e),
    };
    match minted {
        Ok(()) => {
            info!(project_id, amount, %dest, "tokens minted");
            Ok(())
        }
        Err(cause) => Err(MutationError::MintFailed {
            project_id: Some(project_id),
            cause,
        }),
    }
}

/// One-off mint of a single token with explicit fields, outside any registry
/// entry.
pub async fn mint_single<L: CarbonLedger>(
    ledger: &L,
    to: &AccountAddress,
    content_pointer: &str,
    location: &str,
    name: &str,
) -> Result<(), MutationError> {
    let tx = ledger
        .mint_nft(to, content_pointer, location, name)
        .await
        .map_err(classify_ledger_error)?;
    settle(ledger, tx).await.map_err(classify_ledger_error)?;
    Ok(())
}

/// Retire one token held by the ledger's account.
pub async fn retire_token<L: CarbonLedger>(
    ledger: &L,
    token_id: u64,
) -> Result<(), MutationError> {
    let tx = ledger.retire(token_id).await.map_err(classify_ledger_error)?;
    settle(ledger, tx).await.map_err(classify_ledger_error)?;
    info!(token_id, "token retired");
    Ok(())
}

/// Retire the caller's first `count` active tokens of one project, ascending
/// by token id, one confirmed transaction each.
///
/// Bounds are checked against `view` before anything is submitted; a count of
/// zero or more than the active holding is rejected locally. The first
/// on-chain failure stops the batch, reporting how many retires already
/// landed (those are permanent).
pub async fn retire_batch<L: CarbonLedger>(
    ledger: &L,
    view: &ChainView,
    project_id: u64,
    count: u32,
) -> Result<u32, RetireBatchError> {
    let active = view.my_active_token_ids(project_id);
    let held = active.len() as u32;
    if count == 0 || count > held {
        return Err(RetireBatchError::InvalidCount {
            requested: count,
            active: held,
        });
    }

    let mut retired = 0;
    for token_id in active.into_iter().take(count as usize) {
        if let Err(cause) = retire_token(ledger, token_id).await {
            warn!(token_id, retired, %cause, "retire batch stopped");
            return Err(RetireBatchError::Aborted { retired, cause });
        }
        retired += 1;
    }
    Ok(retired)
}

/// Transfer an active token. Retired tokens are rejected by the ledger and
/// surface as [`MutationError::TransferBlocked`].
pub async fn transfer_token<L: CarbonLedger>(
    ledger: &L,
    from: &AccountAddress,
    to: &AccountAddress,
    token_id: u64,
) -> Result<(), MutationError> {
    let tx = ledger
        .transfer_from(from, to, token_id)
        .await
        .map_err(classify_ledger_error)?;
    settle(ledger, tx).await.map_err(classify_ledger_error)?;
    info!(token_id, %to, "token transferred");
    Ok(())
}
