use cb_api_types::RegistryEntry;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::gateway::to_gateway_url;

/// Pinning-service gateway the registry document lives behind.
pub const DEFAULT_GATEWAY: &str = "https://yellow-wooden-pinniped-79.mypinata.cloud/ipfs/";

/// CID of the published registry fact sheet.
pub const DEFAULT_REGISTRY_CID: &str =
    "bafkreibraxzzhite42v4g7dskkpfr6ktktvmhpeb7qzy5wjxdyqideylx4";

#[cfg(not(target_arch = "wasm32"))]
const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("registry document malformed: {0}")]
    InvalidBody(String),
}

/// One registry entry as published, before normalization. Field names and
/// value types vary between registry revisions, so everything arrives loose
/// and is tightened in [`normalize`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(default, alias = "projectId")]
    registry_project_id: Option<Value>,

    #[serde(default, rename = "ipfsCID", alias = "contentPointer")]
    ipfs_cid: Option<String>,

    #[serde(default)]
    location: Option<String>,

    #[serde(default, alias = "name")]
    project_name: Option<String>,

    #[serde(default, alias = "amountRetired")]
    amount: Option<Value>,

    #[serde(default)]
    retired_by: Option<String>,

    #[serde(default)]
    retired_date: Option<String>,
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn normalize(raw: RawEntry) -> Option<RegistryEntry> {
    let registry_project_id = raw.registry_project_id.as_ref().and_then(value_to_string)?;
    let content_pointer = raw.ipfs_cid.map(|c| c.trim().to_string())?;
    let amount = raw.amount.as_ref().and_then(value_to_u32)?;
    Some(RegistryEntry {
        registry_project_id,
        content_pointer,
        location: raw.location.unwrap_or_default(),
        project_name: raw.project_name.unwrap_or_default(),
        amount,
        retired_by: raw.retired_by.filter(|s| !s.trim().is_empty()),
        retired_date: raw.retired_date.filter(|s| !s.trim().is_empty()),
    })
}

/// Where the registry document is fetched from.
///
/// Defaults come from the published deployment and can be overridden per
/// environment with `CARBON_REGISTRY_GATEWAY` and `CARBON_REGISTRY_CID`, or
/// explicitly through [`RegistrySource::new`].
pub struct RegistrySource {
    gateway: String,
    registry_cid: String,
    http: reqwest::Client,
}

impl RegistrySource {
    pub fn new(gateway: Option<String>, registry_cid: Option<String>) -> Self {
        let gateway = gateway
            .or_else(|| std::env::var("CARBON_REGISTRY_GATEWAY").ok())
            .unwrap_or_else(|| DEFAULT_GATEWAY.to_string());
        let registry_cid = registry_cid
            .or_else(|| std::env::var("CARBON_REGISTRY_CID").ok())
            .unwrap_or_else(|| DEFAULT_REGISTRY_CID.to_string());
        Self {
            gateway,
            registry_cid,
            http: build_client(),
        }
    }

    /// Gateway base used for the registry and for every content pointer
    /// found in it.
    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Fetch and normalize the registry document. Entries missing a registry
    /// id, content pointer, or amount are dropped with a warning rather than
    /// failing the whole document.
    pub async fn load(&self) -> Result<Registry, RegistryError> {
        let url = to_gateway_url(&self.gateway, &self.registry_cid);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Unavailable(format!(
                "HTTP {status} from gateway"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        let raw: Vec<RawEntry> = serde_json::from_str(&body)
            .map_err(|e| RegistryError::InvalidBody(e.to_string()))?;

        let total = raw.len();
        let entries: Vec<RegistryEntry> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let entry = normalize(raw);
                if entry.is_none() {
                    warn!(index, "skipping incomplete registry entry");
                }
                entry
            })
            .collect();
        info!(kept = entries.len(), total, "registry loaded");
        Ok(Registry { entries })
    }
}

impl Default for RegistrySource {
    fn default() -> Self {
        Self::new(None, None)
    }
}

fn build_client() -> reqwest::Client {
    #[cfg(not(target_arch = "wasm32"))]
    {
        reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
    #[cfg(target_arch = "wasm32")]
    {
        reqwest::Client::new()
    }
}

/// A loaded, normalized registry document.
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Look up an entry by its registry-assigned project id. Ids are matched
    /// as trimmed strings so `"1001"` and ` 1001 ` refer to the same entry.
    pub fn find_by_registry_id(&self, registry_project_id: &str) -> Option<&RegistryEntry> {
        let wanted = registry_project_id.trim();
        self.entries
            .iter()
            .find(|e| e.registry_project_id == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(entries: &str) -> Vec<RegistryEntry> {
        let raw: Vec<RawEntry> = serde_json::from_str(entries).unwrap();
        raw.into_iter().filter_map(normalize).collect()
    }

    #[test]
    fn current_shape_normalizes() {
        let entries = parse(
            r#"[{
                "registryProjectId": "VCS-1001",
                "ipfsCID": "ipfs://bafymeta1",
                "location": "Kenya",
                "projectName": "Mangrove Restoration",
                "amount": 5
            }]"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].registry_project_id, "VCS-1001");
        assert_eq!(entries[0].content_pointer, "ipfs://bafymeta1");
        assert_eq!(entries[0].amount, 5);
        assert!(entries[0].retired_by.is_none());
    }

    #[test]
    fn legacy_field_names_and_numeric_values_normalize() {
        let entries = parse(
            r#"[{
                "projectId": 1001,
                "contentPointer": "bafymeta2",
                "name": "Solar Farm",
                "amount": "12"
            }]"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].registry_project_id, "1001");
        assert_eq!(entries[0].content_pointer, "bafymeta2");
        assert_eq!(entries[0].project_name, "Solar Farm");
        assert_eq!(entries[0].amount, 12);
    }

    #[test]
    fn incomplete_entries_are_dropped() {
        let entries = parse(
            r#"[
                {"registryProjectId": "VCS-1", "amount": 3},
                {"registryProjectId": "VCS-2", "ipfsCID": "bafyok", "amount": 3}
            ]"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].registry_project_id, "VCS-2");
    }

    #[test]
    fn lookup_matches_trimmed_ids() {
        let registry = Registry {
            entries: parse(
                r#"[{"registryProjectId": "VCS-9", "ipfsCID": "bafy", "amount": 1}]"#,
            ),
        };
        assert!(registry.find_by_registry_id(" VCS-9 ").is_some());
        assert!(registry.find_by_registry_id("VCS-10").is_none());
    }

    #[test]
    fn a_non_array_document_is_invalid() {
        let raw: Result<Vec<RawEntry>, _> = serde_json::from_str(r#"{"entries": []}"#);
        assert!(raw.is_err());
    }
}
