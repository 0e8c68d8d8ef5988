use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, hex};
use cb_api_types::AccountAddress;
use cb_ledger::{
    BindingError, CarbonLedger, LedgerBinder, LedgerError, PendingTx, ProjectData, TxReceipt,
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::abi;
use crate::rpc::JsonRpcClient;

const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(1);
const CONFIRM_MAX_ATTEMPTS: u32 = 120;

#[derive(Debug, Error)]
pub enum EvmConfigError {
    #[error("CARBON_CONTRACT_ADDRESS is not set and no address was supplied")]
    MissingContractAddress,

    #[error("invalid contract address {0}")]
    BadContractAddress(String),

    #[error("invalid RPC endpoint: {0}")]
    BadEndpoint(String),
}

/// A connection to one CarbonNFT deployment on one node.
///
/// Reads `CARBON_RPC_URL` (default `http://localhost:8545`) and
/// `CARBON_CONTRACT_ADDRESS` from the environment when not supplied
/// explicitly.
#[derive(Clone, Debug)]
pub struct EvmChain {
    rpc: Arc<JsonRpcClient>,
    contract: Address,
}

impl EvmChain {
    pub fn new(
        endpoint: Option<String>,
        contract_address: Option<String>,
    ) -> Result<Self, EvmConfigError> {
        let endpoint = endpoint
            .or_else(|| std::env::var("CARBON_RPC_URL").ok())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let contract_address = contract_address
            .or_else(|| std::env::var("CARBON_CONTRACT_ADDRESS").ok())
            .ok_or(EvmConfigError::MissingContractAddress)?;

        let contract = contract_address
            .trim()
            .parse::<Address>()
            .map_err(|_| EvmConfigError::BadContractAddress(contract_address))?;
        let rpc = JsonRpcClient::new(&endpoint)
            .map_err(|e| EvmConfigError::BadEndpoint(e.to_string()))?;

        Ok(Self {
            rpc: Arc::new(rpc),
            contract,
        })
    }
}

impl LedgerBinder for EvmChain {
    type Handle = EvmLedger;

    fn bind(&self, account: &AccountAddress) -> Result<EvmLedger, BindingError> {
        let from = abi::parse_address(account).map_err(|e| BindingError {
            account: account.to_string(),
            reason: e.to_string(),
        })?;
        Ok(EvmLedger {
            rpc: self.rpc.clone(),
            contract: self.contract,
            from,
            account: account.clone(),
        })
    }
}

/// A CarbonNFT handle pinned to one `from` account on one node.
#[derive(Clone)]
pub struct EvmLedger {
    rpc: Arc<JsonRpcClient>,
    contract: Address,
    from: Address,
    account: AccountAddress,
}

impl EvmLedger {
    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let params = json!([
            {
                "from": abi::format_address(self.from),
                "to": abi::format_address(self.contract),
                "data": hex::encode_prefixed(&data),
            },
            "latest",
        ]);
        let result = self.rpc.call("eth_call", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode("eth_call result is not a hex string".into()))?;
        hex::decode(raw).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn send_transaction(&self, data: Vec<u8>) -> Result<PendingTx, LedgerError> {
        let params = json!([{
            "from": abi::format_address(self.from),
            "to": abi::format_address(self.contract),
            "data": hex::encode_prefixed(&data),
        }]);
        let result = self.rpc.call("eth_sendTransaction", params).await?;
        let tx_hash = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode("transaction hash missing".into()))?
            .to_string();
        debug!(%tx_hash, "transaction submitted");
        Ok(PendingTx { tx_hash })
    }
}

#[async_trait::async_trait]
impl CarbonLedger for EvmLedger {
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

    /// Poll for the receipt, bounded so a stalled node cannot hang the
    /// caller forever.
    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, LedgerError> {
        for _ in 0..CONFIRM_MAX_ATTEMPTS {
            let receipt = self
                .rpc
                .call("eth_getTransactionReceipt", json!([tx.tx_hash]))
                .await?;

            match receipt {
                Value::Null => {
                    tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
                }
                value => {
                    let status = value.get("status").and_then(Value::as_str).unwrap_or("0x1");
                    if status == "0x0" {
                        // Receipts carry no revert reason; callers fall back
                        // to the generic description.
                        warn!(tx_hash = %tx.tx_hash, "transaction reverted");
                        return Err(LedgerError::Reverted {
                            reason: "transaction reverted".to_string(),
                        });
                    }
                    return Ok(TxReceipt {
                        tx_hash: tx.tx_hash.clone(),
                    });
                }
            }
        }
        Err(LedgerError::Transport(format!(
            "no confirmation for {} after {} attempts",
            tx.tx_hash, CONFIRM_MAX_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_contract_address_is_a_config_error() {
        // Explicit None and no env override in the test environment.
        unsafe { std::env::remove_var("CARBON_CONTRACT_ADDRESS") };
        let err = EvmChain::new(Some(DEFAULT_RPC_URL.to_string()), None).unwrap_err();
        assert!(matches!(err, EvmConfigError::MissingContractAddress));
    }

    #[test]
    fn binding_rejects_malformed_accounts() {
        let chain = EvmChain::new(
            Some(DEFAULT_RPC_URL.to_string()),
            Some("0x00000000000000000000000000000000000000aa".to_string()),
        )
        .unwrap();
        assert!(chain.bind(&AccountAddress::new("nope")).is_err());
        assert!(
            chain
                .bind(&AccountAddress::new(
                    "0x00000000000000000000000000000000000000bb"
                ))
                .is_ok()
        );
    }
}
