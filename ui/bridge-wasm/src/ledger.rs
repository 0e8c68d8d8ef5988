//! CarbonLedger over the injected provider.
//!
//! Reads go through `eth_call`, mutations through `eth_sendTransaction` so
//! the wallet extension signs and prompts. The ABI codec is shared with the
//! native client via `cb_ledger_evm::abi`.

use alloy_primitives::{Address, address, hex};
use cb_api_types::AccountAddress;
use cb_ledger::{
    BindingError, CarbonLedger, LedgerBinder, LedgerError, PendingTx, ProjectData, TxReceipt,
};
use cb_ledger_evm::abi;
use gloo_console::warn;
use wasm_bindgen::prelude::*;

use crate::provider::{Ethereum, error_message};

/// First contract deployed by the local development node.
const DEFAULT_CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

const CONFIRM_POLL_MS: u32 = 1_000;
const CONFIRM_MAX_ATTEMPTS: u32 = 120;
const REVERT_PREFIX: &str = "execution reverted: ";

/// Binder over the injected provider and one contract deployment.
///
/// The contract address can be overridden by the page through a
/// `window.CARBON_CONTRACT_ADDRESS` global.
#[derive(Clone)]
pub struct ProviderChain {
    eth: Ethereum,
    contract: Address,
}

impl ProviderChain {
    pub fn new(eth: Ethereum) -> Self {
        let contract = configured_contract().unwrap_or(DEFAULT_CONTRACT);
        Self { eth, contract }
    }
}

fn configured_contract() -> Option<Address> {
    let window = web_sys::window()?;
    let v = js_sys::Reflect::get(&window, &JsValue::from_str("CARBON_CONTRACT_ADDRESS")).ok()?;
    v.as_string()?.trim().parse().ok()
}

impl LedgerBinder for ProviderChain {
    type Handle = ProviderLedger;

    fn bind(&self, account: &AccountAddress) -> Result<ProviderLedger, BindingError> {
        let from = abi::parse_address(account).map_err(|e| BindingError {
            account: account.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ProviderLedger {
            eth: self.eth.clone(),
            contract: self.contract,
            from,
            account: account.clone(),
        })
    }
}

/// A CarbonNFT handle submitting through the wallet extension as one account.
#[derive(Clone)]
pub struct ProviderLedger {
    eth: Ethereum,
    contract: Address,
    from: Address,
    account: AccountAddress,
}

fn ledger_error(err: JsValue) -> LedgerError {
    let message = error_message(&err);
    let lowered = message.to_lowercase();
    if lowered.contains("revert") {
        // Wallets wrap the node message; the reason sits after the prefix.
        let reason = match message.find(REVERT_PREFIX) {
            Some(at) => message[at + REVERT_PREFIX.len()..]
                .trim_end_matches(['"', '}', ')'])
                .trim()
                .to_string(),
            None => message,
        };
        LedgerError::Reverted { reason }
    } else {
        LedgerError::Transport(message)
    }
}

impl ProviderLedger {
    async fn request(
        &self,
        method: &str,
        params: &serde_json::Value,
    ) -> Result<JsValue, LedgerError> {
        let params =
            serde_wasm_bindgen::to_value(params).map_err(|e| LedgerError::Decode(e.to_string()))?;
        self.eth.request(method, params).await.map_err(ledger_error)
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let params = serde_json::json!([
            {
                "to": abi::format_address(self.contract),
                "data": hex::encode_prefixed(&data),
            },
            "latest",
        ]);
        let result = self.request("eth_call", &params).await?;
        let raw = result
            .as_string()
            .ok_or_else(|| LedgerError::Decode("eth_call result is not a hex string".into()))?;
        hex::decode(&raw).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn send_transaction(&self, data: Vec<u8>) -> Result<PendingTx, LedgerError> {
        let params = serde_json::json!([{
            "from": abi::format_address(self.from),
            "to": abi::format_address(self.contract),
            "data": hex::encode_prefixed(&data),
        }]);
        let result = self.request("eth_sendTransaction", &params).await?;
        let tx_hash = result
            .as_string()
            .ok_or_else(|| LedgerError::Decode("transaction hash missing".into()))?;
        Ok(PendingTx { tx_hash })
    }
}

#[async_trait::async_trait(?Send)]
impl CarbonLedger for ProviderLedger {
    fn account(&self) -> &AccountAddress {
        &self.account
    }

    async fn project_counter(&self) -> Result<u64, LedgerError> {
        abi::decode_project_counter(&self.eth_call(abi::encode_project_counter()).await?)
    }

    async fn token_counter(&self) -> Result<u64, LedgerError> {
        abi::decode_token_counter(&self.eth_call(abi::encode_token_counter()).await?)
    }

    async fn project_data(&self, project_id: u64) -> Result<ProjectData, LedgerError> {
        abi::decode_get_project_data(&self.eth_call(abi::encode_get_project_data(project_id)).await?)
    }

    async fn owner_of(&self, token_id: u64) -> Result<AccountAddress, LedgerError> {
        abi::decode_owner_of(&self.eth_call(abi::encode_owner_of(token_id)).await?)
    }

    async fn is_retired(&self, token_id: u64) -> Result<bool, LedgerError> {
        abi::decode_is_retired(&self.eth_call(abi::encode_is_retired(token_id)).await?)
    }

    async fn token_project(&self, token_id: u64) -> Result<u64, LedgerError> {
        abi::decode_token_to_project(&self.eth_call(abi::encode_token_to_project(token_id)).await?)
    }

    async fn is_bridged(&self, registry_project_id: &str) -> Result<bool, LedgerError> {
        abi::decode_bridged_project_ids(
            &self
                .eth_call(abi::encode_bridged_project_ids(registry_project_id))
                .await?,
        )
    }

    async fn token_uri(&self, token_id: u64) -> Result<String, LedgerError> {
        abi::decode_token_uri(&self.eth_call(abi::encode_token_uri(token_id)).await?)
    }

    async fn create_project(&self, data: &ProjectData) -> Result<PendingTx, LedgerError> {
        self.send_transaction(abi::encode_create_project(data)).await
    }

    async fn mint_nft(
        &self,
        to: &AccountAddress,
        content_pointer: &str,
        location: &str,
        name: &str,
    ) -> Result<PendingTx, LedgerError> {
        let to = abi::parse_address(to)?;
        self.send_transaction(abi::encode_mint_nft(to, content_pointer, location, name))
            .await
    }

    async fn mint_batch(
        &self,
        to: &AccountAddress,
        project_id: u64,
        amount: u32,
    ) -> Result<PendingTx, LedgerError> {
        let to = abi::parse_address(to)?;
        self.send_transaction(abi::encode_mint_batch(to, project_id, amount))
            .await
    }

    async fn retire(&self, token_id: u64) -> Result<PendingTx, LedgerError> {
        self.send_transaction(abi::encode_retire(token_id)).await
    }

    async fn transfer_from(
        &self,
        from: &AccountAddress,
        to: &AccountAddress,
        token_id: u64,
    ) -> Result<PendingTx, LedgerError> {
        let from = abi::parse_address(from)?;
        let to = abi::parse_address(to)?;
        self.send_transaction(abi::encode_transfer_from(from, to, token_id))
            .await
    }

    /// Poll for the receipt, bounded so a stalled node cannot hang the UI.
    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, LedgerError> {
        for _ in 0..CONFIRM_MAX_ATTEMPTS {
            let receipt = self
                .request(
                    "eth_getTransactionReceipt",
                    &serde_json::json!([tx.tx_hash]),
                )
                .await?;

            if receipt.is_null() || receipt.is_undefined() {
                gloo_timers::future::TimeoutFuture::new(CONFIRM_POLL_MS).await;
                continue;
            }

            let status = js_sys::Reflect::get(&receipt, &JsValue::from_str("status"))
                .ok()
                .and_then(|s| s.as_string())
                .unwrap_or_else(|| "0x1".to_string());
            if status == "0x0" {
                warn!("transaction reverted:", tx.tx_hash.clone());
                return Err(LedgerError::Reverted {
                    reason: "transaction reverted".to_string(),
                });
            }
            return Ok(TxReceipt {
                tx_hash: tx.tx_hash.clone(),
            });
        }
        Err(LedgerError::Transport(format!(
            "no confirmation for {} after {} attempts",
            tx.tx_hash, CONFIRM_MAX_ATTEMPTS
        )))
    }
}
