//! Event binding.
//!
//! Wires the static UI controls. Dynamically rendered card buttons are wired
//! in `render.rs` right after insertion. Async handlers are spawned via
//! `wasm_bindgen_futures::spawn_local`.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::dom::Elements;
use crate::ops;

/// Helper: attach async click handler to an HtmlElement.
macro_rules! on_click_async {
    ($el:expr, $els:expr, $handler:expr) => {{
        let els = $els.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let els2 = els.clone();
            wasm_bindgen_futures::spawn_local(async move {
                $handler(&els2).await;
            });
        }) as Box<dyn FnMut(_)>);
        $el.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }};
}

/// Bind all static event listeners. Call once after init.
pub fn bind_events(els: &Elements) {
    on_click_async!(els.connect_btn, els, ops::on_connect);
    on_click_async!(els.reload_registry_btn, els, ops::load_registry);
    on_click_async!(els.refresh_btn, els, ops::refresh);
}
