//! DOM element bindings.
//!
//! All fields are resolved once at startup. To add new UI elements, add a
//! field here and bind it in `Elements::bind()`.

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement};

// ── Helpers ──

fn doc() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

pub fn by_id(id: &str) -> Option<Element> {
    doc().get_element_by_id(id)
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn set_inner_html(el: &Element, html: &str) {
    el.set_inner_html(html);
}

pub fn get_input_value(el: &HtmlInputElement) -> String {
    el.value().trim().to_string()
}

pub fn set_disabled(el: &HtmlElement, disabled: bool) {
    if disabled {
        let _ = el.set_attribute("disabled", "disabled");
    } else {
        let _ = el.remove_attribute("disabled");
    }
}

pub fn add_class(el: &Element, cls: &str) {
    let _ = el.class_list().add_1(cls);
}

pub fn remove_class(el: &Element, cls: &str) {
    let _ = el.class_list().remove_1(cls);
}

pub fn create_element(tag: &str) -> Element {
    doc().create_element(tag).unwrap()
}

/// Query all matching elements within a parent element.
pub fn query_all_within(parent: &Element, selector: &str) -> Vec<Element> {
    let nl = parent.query_selector_all(selector).unwrap();
    let mut v = Vec::new();
    for i in 0..nl.length() {
        if let Some(e) = nl.item(i) {
            if let Ok(el) = e.dyn_into::<Element>() {
                v.push(el);
            }
        }
    }
    v
}

pub fn window() -> web_sys::Window {
    web_sys::window().unwrap()
}

// ── Elements struct ──

/// All DOM element references used by the bridge UI.
/// Clone-friendly (all inner types are reference-counted via JS GC).
#[derive(Clone)]
pub struct Elements {
    // Session bar
    pub connect_btn: HtmlElement,
    pub account_label: Element,
    pub session_status: Element,

    // Mint page (registry)
    pub registry_list: Element,
    pub registry_status: Element,
    pub reload_registry_btn: HtmlElement,

    // Gallery
    pub refresh_btn: HtmlElement,
    pub gallery_status: Element,
    pub project_list: Element,
    pub my_tokens: Element,
    pub other_tokens: Element,

    // Transaction feedback
    pub tx_result: Element,
}

macro_rules! get_el {
    ($id:expr) => {
        by_id($id).ok_or_else(|| JsValue::from_str(&format!("missing element #{}", $id)))?
    };
}

macro_rules! get_html {
    ($id:expr) => {
        by_id_typed::<HtmlElement>($id)
            .ok_or_else(|| JsValue::from_str(&format!("missing html element #{}", $id)))?
    };
}

impl Elements {
    /// Resolve all DOM references. Call once after DOMContentLoaded.
    pub fn bind() -> Result<Elements, JsValue> {
        Ok(Elements {
            connect_btn: get_html!("connectBtn"),
            account_label: get_el!("accountLabel"),
            session_status: get_el!("sessionStatus"),

            registry_list: get_el!("registryList"),
            registry_status: get_el!("registryStatus"),
            reload_registry_btn: get_html!("reloadRegistryBtn"),

            refresh_btn: get_html!("refreshBtn"),
            gallery_status: get_el!("galleryStatus"),
            project_list: get_el!("projectList"),
            my_tokens: get_el!("myTokens"),
            other_tokens: get_el!("otherTokens"),

            tx_result: get_el!("txResult"),
        })
    }
}
