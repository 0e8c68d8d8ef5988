//! Off-chain registry access for the carbon bridge.
//!
//! The registry is a JSON fact sheet of verified carbon projects pinned on
//! IPFS. This crate fetches it through an HTTP gateway, normalizes the entry
//! shapes that appear in the wild, and resolves per-project metadata
//! documents on a best-effort basis.

mod gateway;
mod metadata;
mod registry;

pub use gateway::{FALLBACK_GATEWAY, to_gateway_url};
pub use metadata::{MetadataError, fetch_metadata, fetch_metadata_for_projects};
pub use registry::{
    DEFAULT_GATEWAY, DEFAULT_REGISTRY_CID, Registry, RegistryError, RegistrySource,
};
