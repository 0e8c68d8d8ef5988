use serde::{Deserialize, Serialize};

/// A wallet or contract account address.
///
/// The constructor trims and lowercases, so two addresses that differ only in
/// checksum casing or surrounding whitespace compare equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AccountAddress(String);

impl AccountAddress {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened display form, e.g. `0x1234…abcd`.
    pub fn short(&self) -> String {
        if self.0.len() <= 10 {
            return self.0.clone();
        }
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl std::fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountAddress {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// An on-chain project record, one per bridged registry project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Dense, zero-based on-chain id assigned at creation.
    pub project_id: u64,
    /// External registry identifier, e.g. `"VCS-1001"`.
    pub registry_project_id: String,
    /// Content-addressed pointer to the project's metadata document.
    pub content_pointer: String,
    pub location: String,
    pub name: String,
}

/// An on-chain token representing one ton of offset CO₂.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    /// Dense, zero-based id assigned at mint time.
    pub token_id: u64,
    pub owner: AccountAddress,
    /// The project this token was minted under; never changes.
    pub project_id: u64,
    /// One-way latch; a retired token can no longer be transferred.
    pub retired: bool,
}

/// Canonical shape of one off-chain registry listing.
///
/// The wire document comes in two historical field layouts; the registry
/// fetcher normalizes both into this struct and nothing downstream ever sees
/// the variant names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryEntry {
    pub registry_project_id: String,
    pub content_pointer: String,
    pub location: String,
    pub project_name: String,
    /// Tons of CO₂ offset, i.e. the number of tokens a bridge mints.
    pub amount: u32,
    pub retired_by: Option<String>,
    pub retired_date: Option<String>,
}

/// Off-chain metadata document resolved through the IPFS gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// A content pointer itself; resolve through the gateway before display.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}
