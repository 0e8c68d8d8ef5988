//! Minimal Ethereum JSON-RPC transport.
//!
//! Node errors that carry a revert reason surface as
//! [`LedgerError::Reverted`] with the reason string preserved; everything
//! else is a transport or decode error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cb_ledger::LedgerError;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REVERT_PREFIX: &str = "execution reverted: ";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: Url,
    id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: &str) -> Result<Self, LedgerError> {
        let url = Url::parse(endpoint)
            .map_err(|e| LedgerError::Transport(format!("bad RPC endpoint {endpoint}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url,
            id: AtomicU64::new(1),
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "rpc request");

        let response = self
            .http
            .post(self.url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("HTTP {status} from node")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(classify_rpc_error(err));
        }

        // A JSON `null` result is legitimate, e.g. a receipt lookup for a
        // transaction that is still pending.
        Ok(body.result.unwrap_or(Value::Null))
    }
}

fn classify_rpc_error(err: RpcError) -> LedgerError {
    let lowered = err.message.to_lowercase();
    if lowered.contains("revert") {
        let reason = err
            .message
            .strip_prefix(REVERT_PREFIX)
            .unwrap_or(&err.message)
            .to_string();
        LedgerError::Reverted { reason }
    } else {
        LedgerError::Transport(format!("rpc error {}: {}", err.code, err.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_reasons_are_stripped_of_the_node_prefix() {
        let err = classify_rpc_error(RpcError {
            code: 3,
            message: "execution reverted: Token already retired".to_string(),
        });
        assert_eq!(err.revert_reason(), Some("Token already retired"));
    }

    #[test]
    fn non_revert_errors_stay_transport_errors() {
        let err = classify_rpc_error(RpcError {
            code: -32601,
            message: "method not found".to_string(),
        });
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[test]
    fn bad_endpoint_is_rejected_at_construction() {
        assert!(JsonRpcClient::new("not a url").is_err());
    }
}
