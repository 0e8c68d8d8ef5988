//! Session and transaction operations.
//!
//! Each function is wired in `events.rs` or from dynamically rendered
//! buttons. Mutations are guarded by the busy flag so only one transaction
//! flow runs at a time, and every one ends with a fresh aggregation pass
//! rather than trusting local bookkeeping.

use cb_api_types::AccountAddress;
use cb_bridge_core::{
    MutationError, RetireBatchError, SessionError, aggregate, bridge_and_mint, mint_for_project,
    retire_batch, retire_token, transfer_token,
};
use cb_ledger::CarbonLedger;
use cb_registry::fetch_metadata_for_projects;
use gloo_console::error;

use crate::dom::{self, Elements};
use crate::provider::Ethereum;
use crate::render;
use crate::state;

/// Silent session restore on load. No prompt, no error surface.
pub async fn restore_session(els: &Elements) {
    let Some(mut manager) = state::take_manager() else {
        return;
    };
    let restored = manager.check_existing_session().await;
    state::put_manager(manager);

    match restored {
        Ok(Some(handle)) => {
            state::set_ledger(Some(handle.ledger));
        }
        Ok(None) => {}
        Err(e) => {
            error!("session restore failed:", e.to_string());
        }
    }
    render::render_session(els);
}

/// Connect button: prompt the wallet for authorization.
pub async fn on_connect(els: &Elements) {
    let Some(mut manager) = state::take_manager() else {
        dom::set_text(&els.session_status, "No wallet provider detected");
        return;
    };
    let connected = manager.request_connection().await;
    state::put_manager(manager);

    match connected {
        Ok(handle) => {
            state::set_ledger(Some(handle.ledger));
            render::render_session(els);
            refresh(els).await;
        }
        Err(SessionError::Rejected) => {
            dom::set_text(&els.session_status, "Connection request rejected");
        }
        Err(e) => {
            dom::set_text(&els.session_status, &e.to_string());
        }
    }
}

/// Follow the wallet's `accountsChanged` events for the page's lifetime.
pub fn subscribe_account_changes(els: &Elements, eth: &Ethereum) {
    let els = els.clone();
    eth.on_accounts_changed(move |accounts| {
        let changed = state::with_manager(|m| m.accounts_changed(&accounts));
        // Whatever happens next, views of the old account are dead.
        state::invalidate_view();

        match changed {
            Some(Ok(Some(handle))) => {
                state::set_ledger(Some(handle.ledger));
            }
            Some(Ok(None)) | None => {
                state::set_ledger(None);
            }
            Some(Err(e)) => {
                error!("account switch failed:", e.to_string());
                state::set_ledger(None);
            }
        }
        render::render_session(&els);

        let els2 = els.clone();
        wasm_bindgen_futures::spawn_local(async move {
            refresh(&els2).await;
        });
    });
}

/// Fetch the registry fact sheet and re-render the mint page.
pub async fn load_registry(els: &Elements) {
    dom::set_text(&els.registry_status, "Loading registry\u{2026}");
    match state::source().load().await {
        Ok(registry) => {
            state::set_registry(registry.entries().to_vec());
            render::render_registry(els);
        }
        Err(e) => {
            dom::set_text(&els.registry_status, &format!("Registry unavailable: {e}"));
        }
    }
}

/// One full aggregation pass: read the chain, resolve metadata, and render —
/// unless a newer pass started in the meantime.
pub async fn refresh(els: &Elements) {
    let Some(ledger) = state::ledger() else {
        render::render_gallery(els);
        render::render_registry(els);
        return;
    };

    let ticket = state::begin_view();
    dom::set_text(&els.gallery_status, "Loading on-chain state\u{2026}");

    let view = match aggregate(&ledger).await {
        Ok(view) => view,
        Err(e) => {
            // A failed pass kills the current view: drop it and re-render so
            // no action button keeps operating on stale state.
            state::invalidate_view();
            render::render_gallery(els);
            render::render_registry(els);
            dom::set_text(&els.gallery_status, &e.to_string());
            return;
        }
    };

    let source = state::source();
    let metadata =
        fetch_metadata_for_projects(source.http(), source.gateway(), &view.projects).await;

    if state::commit_view(ticket, view) {
        state::set_metadata(metadata);
        render::render_gallery(els);
        render::render_registry(els);
    }
}

/// Bridge a registry entry: create its project and mint the full amount to
/// the connected account. Re-run after a half-failure to finish the mint.
pub async fn on_bridge(els: &Elements, registry_id: String) {
    if state::busy() {
        return;
    }
    let Some(ledger) = state::ledger() else {
        dom::set_text(&els.tx_result, "Connect a wallet first");
        return;
    };
    let Some(entry) = state::registry()
        .into_iter()
        .find(|e| e.registry_project_id == registry_id)
    else {
        return;
    };

    state::set_busy(true);
    dom::set_text(
        &els.tx_result,
        &format!("Bridging {}\u{2026}", entry.project_name),
    );

    let dest = ledger.account().clone();
    let outcome = match state::pending_mint(&registry_id) {
        // The project already exists from an earlier half-failed bridge.
        Some((project_id, amount)) => mint_for_project(&ledger, project_id, amount, &dest)
            .await
            .map(|()| project_id),
        None => bridge_and_mint(&ledger, &entry, &dest).await,
    };

    match outcome {
        Ok(project_id) => {
            state::clear_pending_mint(&registry_id);
            dom::set_text(
                &els.tx_result,
                &format!("Bridged {} as project {}", registry_id, project_id),
            );
        }
        Err(MutationError::MintFailed {
            project_id: Some(project_id),
            cause,
        }) => {
            state::set_pending_mint(&registry_id, project_id, entry.amount);
            dom::set_text(
                &els.tx_result,
                &format!("Project created but minting failed ({cause}). Bridge again to finish."),
            );
        }
        Err(e) => {
            dom::set_text(&els.tx_result, &e.to_string());
        }
    }

    state::set_busy(false);
    refresh(els).await;
}

/// Retire a single token from the gallery.
pub async fn on_retire_token(els: &Elements, token_id: u64) {
    if state::busy() {
        return;
    }
    let Some(ledger) = state::ledger() else {
        return;
    };

    state::set_busy(true);
    dom::set_text(&els.tx_result, &format!("Retiring token {token_id}\u{2026}"));
    match retire_token(&ledger, token_id).await {
        Ok(()) => dom::set_text(&els.tx_result, &format!("Token {token_id} retired")),
        Err(e) => dom::set_text(&els.tx_result, &e.to_string()),
    }
    state::set_busy(false);
    refresh(els).await;
}

/// Retire N of my active tokens under one project, count read from the
/// project card's input.
pub async fn on_retire_batch(els: &Elements, project_id: u64) {
    if state::busy() {
        return;
    }
    let Some(ledger) = state::ledger() else {
        return;
    };
    let Some(view) = state::view() else {
        return;
    };
    let count = dom::by_id_typed::<web_sys::HtmlInputElement>(&format!("retireCount-{project_id}"))
        .map(|input| dom::get_input_value(&input))
        .and_then(|v| v.parse::<u32>().ok());
    let Some(count) = count else {
        dom::set_text(&els.tx_result, "Enter how many tokens to retire");
        return;
    };

    state::set_busy(true);
    dom::set_text(&els.tx_result, &format!("Retiring {count} tokens\u{2026}"));
    match retire_batch(&ledger, &view, project_id, count).await {
        Ok(retired) => {
            dom::set_text(&els.tx_result, &format!("Retired {retired} tokens"));
        }
        Err(RetireBatchError::InvalidCount { requested, active }) => {
            dom::set_text(
                &els.tx_result,
                &format!("Cannot retire {requested}: only {active} active tokens held"),
            );
        }
        Err(RetireBatchError::Aborted { retired, cause }) => {
            dom::set_text(
                &els.tx_result,
                &format!("Stopped after {retired} retires: {cause}"),
            );
        }
    }
    state::set_busy(false);
    refresh(els).await;
}

/// Transfer an active token; destination prompted from the user.
pub async fn on_transfer(els: &Elements, token_id: u64) {
    if state::busy() {
        return;
    }
    let Some(ledger) = state::ledger() else {
        return;
    };
    let to = dom::window()
        .prompt_with_message("Transfer to address:")
        .ok()
        .flatten()
        .unwrap_or_default();
    if to.trim().is_empty() {
        return;
    }
    let to = AccountAddress::new(&to);

    state::set_busy(true);
    dom::set_text(
        &els.tx_result,
        &format!("Transferring token {token_id}\u{2026}"),
    );
    let from = ledger.account().clone();
    match transfer_token(&ledger, &from, &to, token_id).await {
        Ok(()) => {
            dom::set_text(
                &els.tx_result,
                &format!("Token {} sent to {}", token_id, to.short()),
            );
        }
        Err(e) => dom::set_text(&els.tx_result, &e.to_string()),
    }
    state::set_busy(false);
    refresh(els).await;
}
