//! Carbon Bridge browser frontend.
//!
//! Pure Rust + WASM, driven entirely through the injected wallet provider
//! (`window.ethereum`): session restore, registry listing, bridge + mint,
//! gallery aggregation, retire and transfer. Each concern lives in its own
//! module. The crate only does anything on the wasm32 target; native builds
//! compile just the target-independent helpers so the workspace still
//! type-checks (and runs their tests) as a whole.

#[cfg(target_arch = "wasm32")]
pub mod dom;
#[cfg(target_arch = "wasm32")]
pub mod events;
pub mod html;
#[cfg(target_arch = "wasm32")]
pub mod ledger;
#[cfg(target_arch = "wasm32")]
pub mod ops;
#[cfg(target_arch = "wasm32")]
pub mod provider;
#[cfg(target_arch = "wasm32")]
pub mod render;
#[cfg(target_arch = "wasm32")]
pub mod state;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// WASM entry point – called automatically when the module is instantiated.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    // Improve panic messages in the browser console
    console_error_panic_hook::set_once();

    init().await
}

/// Main initialisation sequence.
#[cfg(target_arch = "wasm32")]
async fn init() -> Result<(), JsValue> {
    let els = dom::Elements::bind()?;

    // Wire the wallet provider, if one is injected
    match provider::Ethereum::detect() {
        Some(eth) => {
            state::install_manager(eth.clone());
            ops::subscribe_account_changes(&els, &eth);
        }
        None => {
            dom::set_text(&els.session_status, "No wallet provider detected");
        }
    }

    // Bind all event listeners
    events::bind_events(&els);

    // Registry first so the mint page renders even without a session
    ops::load_registry(&els).await;

    // Silent session restore, then the first aggregation pass
    ops::restore_session(&els).await;
    ops::refresh(&els).await;

    Ok(())
}
