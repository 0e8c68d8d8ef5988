//! Injected wallet provider binding.
//!
//! Wraps `window.ethereum` (EIP-1193): `request` calls, the
//! `accountsChanged` subscription, and the mapping from provider errors onto
//! [`SessionError`]. Error code 4001 is the user declining a prompt.

use cb_api_types::AccountAddress;
use cb_bridge_core::{SessionError, WalletProvider};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

const USER_REJECTED: i64 = 4001;

/// A handle to the injected EIP-1193 provider.
#[derive(Clone)]
pub struct Ethereum {
    inner: js_sys::Object,
}

impl Ethereum {
    /// Locate `window.ethereum`. `None` when no wallet extension is present.
    pub fn detect() -> Option<Ethereum> {
        let window = web_sys::window()?;
        let eth = js_sys::Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if eth.is_undefined() || eth.is_null() {
            return None;
        }
        Some(Ethereum {
            inner: eth.unchecked_into(),
        })
    }

    /// `provider.request({ method, params })`.
    pub async fn request(&self, method: &str, params: JsValue) -> Result<JsValue, JsValue> {
        let args = js_sys::Object::new();
        js_sys::Reflect::set(&args, &JsValue::from_str("method"), &JsValue::from_str(method))?;
        if !params.is_undefined() {
            js_sys::Reflect::set(&args, &JsValue::from_str("params"), &params)?;
        }
        let request_fn = js_sys::Reflect::get(&self.inner, &JsValue::from_str("request"))?
            .dyn_into::<js_sys::Function>()?;
        let promise: js_sys::Promise = request_fn.call1(&self.inner, &args)?.dyn_into()?;
        JsFuture::from(promise).await
    }

    /// Subscribe to `accountsChanged`. The closure leaks intentionally; the
    /// subscription lives for the page's lifetime.
    pub fn on_accounts_changed(&self, mut handler: impl FnMut(Vec<AccountAddress>) + 'static) {
        let cb = Closure::wrap(Box::new(move |accounts: JsValue| {
            handler(js_accounts(accounts));
        }) as Box<dyn FnMut(JsValue)>);

        let on_fn = js_sys::Reflect::get(&self.inner, &JsValue::from_str("on"))
            .ok()
            .and_then(|f| f.dyn_into::<js_sys::Function>().ok());
        if let Some(on_fn) = on_fn {
            let _ = on_fn.call2(
                &self.inner,
                &JsValue::from_str("accountsChanged"),
                cb.as_ref().unchecked_ref(),
            );
        }
        cb.forget();
    }
}

fn js_accounts(value: JsValue) -> Vec<AccountAddress> {
    js_sys::Array::from(&value)
        .iter()
        .filter_map(|v| v.as_string())
        .map(|s| AccountAddress::new(&s))
        .collect()
}

pub fn error_code(err: &JsValue) -> Option<i64> {
    js_sys::Reflect::get(err, &JsValue::from_str("code"))
        .ok()?
        .as_f64()
        .map(|c| c as i64)
}

pub fn error_message(err: &JsValue) -> String {
    js_sys::Reflect::get(err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

fn session_error(err: JsValue) -> SessionError {
    if error_code(&err) == Some(USER_REJECTED) {
        SessionError::Rejected
    } else {
        SessionError::Provider(error_message(&err))
    }
}

#[async_trait::async_trait(?Send)]
impl WalletProvider for Ethereum {
    async fn existing_accounts(&self) -> Result<Vec<AccountAddress>, SessionError> {
        let accounts = self
            .request("eth_accounts", JsValue::UNDEFINED)
            .await
            .map_err(session_error)?;
        Ok(js_accounts(accounts))
    }

    async fn request_accounts(&self) -> Result<Vec<AccountAddress>, SessionError> {
        let accounts = self
            .request("eth_requestAccounts", JsValue::UNDEFINED)
            .await
            .map_err(session_error)?;
        Ok(js_accounts(accounts))
    }
}
