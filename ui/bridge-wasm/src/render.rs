//! Rendering for the session bar, mint page, and gallery.
//!
//! Cards are rebuilt from state on every pass; dynamically created buttons
//! are wired right after insertion.

use std::collections::{HashMap, HashSet};

use cb_registry::to_gateway_url;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::dom::{self, Elements};
use crate::html::escape;
use crate::ops;
use crate::state;

/// Session bar: connected account or the call to action.
pub fn render_session(els: &Elements) {
    match state::account() {
        Some(account) => {
            dom::set_text(&els.account_label, &account.short());
            dom::set_text(&els.session_status, "Connected");
            dom::set_text(els.connect_btn.unchecked_ref(), "Connected");
            dom::set_disabled(&els.connect_btn, true);
        }
        None => {
            dom::set_text(&els.account_label, "\u{2014}");
            dom::set_text(&els.session_status, "Not connected");
            dom::set_text(els.connect_btn.unchecked_ref(), "Connect Wallet");
            dom::set_disabled(&els.connect_btn, false);
        }
    }
}

/// Mint page: one card per registry entry, with its bridge state.
pub fn render_registry(els: &Elements) {
    let container = &els.registry_list;
    dom::set_inner_html(container, "");

    let entries = state::registry();
    if entries.is_empty() {
        dom::set_inner_html(
            container,
            r#"<div class="entry-card entry-card--empty">No registry entries loaded.</div>"#,
        );
        return;
    }
    dom::set_text(
        &els.registry_status,
        &format!("{} registry projects", entries.len()),
    );

    // A project on chain per bridged entry, so the view is the bridged set.
    let view = state::view();
    let bridged: HashSet<String> = view
        .as_ref()
        .map(|v| {
            v.projects
                .iter()
                .map(|p| p.registry_project_id.clone())
                .collect()
        })
        .unwrap_or_default();
    // Bridging needs a session and a live view of the chain; without the
    // view the bridged set above is meaningless.
    let actionable = state::ledger().is_some() && view.is_some();

    for entry in &entries {
        let card = dom::create_element("div");
        card.set_attribute("class", "entry-card").unwrap();

        let status_html = if let Some(by) = &entry.retired_by {
            let date = entry.retired_date.as_deref().unwrap_or("");
            format!(
                r#"<span class="entry-status entry-status--retired">retired by {} {}</span>"#,
                escape(by),
                escape(date),
            )
        } else if bridged.contains(&entry.registry_project_id) {
            r#"<span class="entry-status entry-status--bridged">bridged</span>"#.to_string()
        } else if actionable {
            let label = if state::pending_mint(&entry.registry_project_id).is_some() {
                "Finish mint"
            } else {
                "Bridge"
            };
            format!(
                r#"<button class="bridge-btn" data-registry-id="{}">{label}</button>"#,
                escape(&entry.registry_project_id)
            )
        } else if state::ledger().is_some() {
            r#"<span class="entry-status">on-chain state unavailable</span>"#.to_string()
        } else {
            r#"<span class="entry-status">connect to bridge</span>"#.to_string()
        };

        let html = format!(
            r#"
            <div class="entry-name">{}</div>
            <div class="entry-meta">{} • {} • {} tCO₂</div>
            {}
            "#,
            escape(&entry.project_name),
            escape(&entry.registry_project_id),
            escape(&entry.location),
            entry.amount,
            status_html,
        );
        dom::set_inner_html(&card, &html);
        container.append_child(&card).unwrap();
    }

    wire_registry_buttons(els);
}

fn wire_registry_buttons(els: &Elements) {
    for btn in dom::query_all_within(&els.registry_list, ".bridge-btn") {
        let registry_id = btn.get_attribute("data-registry-id").unwrap_or_default();
        let els2 = els.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let els3 = els2.clone();
            let id = registry_id.clone();
            wasm_bindgen_futures::spawn_local(async move {
                ops::on_bridge(&els3, id).await;
            });
        }) as Box<dyn FnMut(_)>);
        btn.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }
}

/// Gallery: project summaries, my tokens, everyone else's tokens.
pub fn render_gallery(els: &Elements) {
    let Some(view) = state::view() else {
        dom::set_text(&els.gallery_status, "Connect a wallet to view the gallery");
        dom::set_inner_html(&els.project_list, "");
        dom::set_inner_html(&els.my_tokens, "");
        dom::set_inner_html(&els.other_tokens, "");
        return;
    };
    let metadata = state::metadata();
    let gateway = state::source().gateway().to_string();
    let names: HashMap<u64, String> = view
        .projects
        .iter()
        .map(|p| (p.project_id, p.name.clone()))
        .collect();

    dom::set_text(
        &els.gallery_status,
        &format!(
            "{} projects, {} tokens on chain",
            view.projects.len(),
            view.tokens.len()
        ),
    );

    // ── Project summaries ──
    let container = &els.project_list;
    dom::set_inner_html(container, "");
    for summary in view.project_summaries() {
        let card = dom::create_element("div");
        card.set_attribute("class", "project-card").unwrap();
        let retire_html = if summary.my_active > 0 {
            format!(
                r#"<div class="project-retire">
                  <input id="retireCount-{pid}" type="number" min="1" max="{active}" value="1" />
                  <button class="retire-batch-btn" data-project-id="{pid}">Retire</button>
                </div>"#,
                pid = summary.project.project_id,
                active = summary.my_active,
            )
        } else {
            String::new()
        };
        let html = format!(
            r#"
            <div class="project-name">{}</div>
            <div class="project-meta">{} • {}</div>
            <div class="project-counts">minted {} • mine active {} • mine retired {}</div>
            {}
            "#,
            escape(&summary.project.name),
            escape(&summary.project.registry_project_id),
            escape(&summary.project.location),
            summary.total_minted,
            summary.my_active,
            summary.my_retired,
            retire_html,
        );
        dom::set_inner_html(&card, &html);
        container.append_child(&card).unwrap();
    }

    // ── My tokens ──
    let container = &els.my_tokens;
    dom::set_inner_html(container, "");
    for token in view.my_tokens() {
        let card = dom::create_element("div");
        card.set_attribute("class", "token-card").unwrap();
        let name = names
            .get(&token.project_id)
            .cloned()
            .unwrap_or_else(|| format!("project {}", token.project_id));
        let image_html = metadata
            .get(&token.project_id)
            .and_then(|m| m.image.as_deref())
            .map(|image| {
                format!(
                    r#"<img class="token-image" src="{}" alt="{}" />"#,
                    escape(&to_gateway_url(&gateway, image)),
                    escape(&name),
                )
            })
            .unwrap_or_default();
        let actions_html = if token.retired {
            r#"<span class="token-status token-status--retired">Retired</span>"#.to_string()
        } else {
            format!(
                r#"<span class="token-status">Active</span>
                <button class="retire-token-btn" data-token-id="{id}">Retire</button>
                <button class="transfer-btn" data-token-id="{id}">Transfer</button>"#,
                id = token.token_id,
            )
        };
        let html = format!(
            r#"
            {image_html}
            <div class="token-title">Token #{}</div>
            <div class="token-project">{}</div>
            {actions_html}
            "#,
            token.token_id,
            escape(&name),
        );
        dom::set_inner_html(&card, &html);
        container.append_child(&card).unwrap();
    }

    // ── Everyone else's tokens ──
    let container = &els.other_tokens;
    dom::set_inner_html(container, "");
    for token in view.other_tokens() {
        let card = dom::create_element("div");
        card.set_attribute("class", "token-card token-card--other").unwrap();
        let name = names
            .get(&token.project_id)
            .cloned()
            .unwrap_or_else(|| format!("project {}", token.project_id));
        let status = if token.retired { "Retired" } else { "Active" };
        let html = format!(
            r#"
            <div class="token-title">Token #{}</div>
            <div class="token-project">{}</div>
            <div class="token-owner">{}</div>
            <span class="token-status">{status}</span>
            "#,
            token.token_id,
            escape(&name),
            token.owner.short(),
        );
        dom::set_inner_html(&card, &html);
        container.append_child(&card).unwrap();
    }

    wire_gallery_buttons(els);
}

fn wire_gallery_buttons(els: &Elements) {
    for btn in dom::query_all_within(&els.project_list, ".retire-batch-btn") {
        let project_id = data_u64(&btn, "data-project-id");
        let els2 = els.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let els3 = els2.clone();
            wasm_bindgen_futures::spawn_local(async move {
                ops::on_retire_batch(&els3, project_id).await;
            });
        }) as Box<dyn FnMut(_)>);
        btn.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }

    for btn in dom::query_all_within(&els.my_tokens, ".retire-token-btn") {
        let token_id = data_u64(&btn, "data-token-id");
        let els2 = els.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let els3 = els2.clone();
            wasm_bindgen_futures::spawn_local(async move {
                ops::on_retire_token(&els3, token_id).await;
            });
        }) as Box<dyn FnMut(_)>);
        btn.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }

    for btn in dom::query_all_within(&els.my_tokens, ".transfer-btn") {
        let token_id = data_u64(&btn, "data-token-id");
        let els2 = els.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let els3 = els2.clone();
            wasm_bindgen_futures::spawn_local(async move {
                ops::on_transfer(&els3, token_id).await;
            });
        }) as Box<dyn FnMut(_)>);
        btn.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }
}

fn data_u64(el: &web_sys::Element, attr: &str) -> u64 {
    el.get_attribute(attr)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}
