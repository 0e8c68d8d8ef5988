//! Best-effort resolution of per-project metadata documents.
//!
//! Metadata lives behind content pointers and a public gateway, both outside
//! our control, so a failed or malformed fetch never fails the caller: the
//! project is simply presented without metadata. When the configured gateway
//! fails, the fetch retries once through [`FALLBACK_GATEWAY`].

use std::collections::HashMap;

use cb_api_types::{Project, TokenMetadata};
use futures::StreamExt;
use thiserror::Error;
use tracing::warn;

use crate::gateway::{FALLBACK_GATEWAY, to_gateway_url};

const MAX_CONCURRENT_FETCHES: usize = 8;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata unavailable: {0}")]
    Unavailable(String),

    #[error("metadata document malformed: {0}")]
    Malformed(String),
}

/// Gateway URLs to try for a pointer, in order: the configured gateway, then
/// the public fallback. An `http(s)` pointer resolves to itself and gets no
/// fallback, and a gateway that already is the fallback is not tried twice.
fn candidate_urls(gateway: &str, content_pointer: &str) -> Vec<String> {
    let primary = to_gateway_url(gateway, content_pointer);
    let fallback = to_gateway_url(FALLBACK_GATEWAY, content_pointer);
    if fallback == primary {
        vec![primary]
    } else {
        vec![primary, fallback]
    }
}

async fn fetch_one(
    http: &reqwest::Client,
    url: &str,
) -> Result<TokenMetadata, MetadataError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| MetadataError::Unavailable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MetadataError::Unavailable(format!(
            "HTTP {status} from gateway"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| MetadataError::Malformed(e.to_string()))
}

/// Resolve one metadata document, falling back to the public gateway when the
/// configured one fails. Returns `None` for an empty pointer or when every
/// candidate fetch or parse fails.
pub async fn fetch_metadata(
    http: &reqwest::Client,
    gateway: &str,
    content_pointer: &str,
) -> Option<TokenMetadata> {
    if content_pointer.trim().is_empty() {
        return None;
    }
    for url in candidate_urls(gateway, content_pointer) {
        match fetch_one(http, &url).await {
            Ok(meta) => return Some(meta),
            Err(e) => {
                warn!(content_pointer, %url, error = %e, "metadata fetch failed");
            }
        }
    }
    None
}

/// Resolve metadata for a set of projects, a bounded number of fetches at a
/// time. Projects whose documents cannot be resolved are absent from the map.
pub async fn fetch_metadata_for_projects(
    http: &reqwest::Client,
    gateway: &str,
    projects: &[Project],
) -> HashMap<u64, TokenMetadata> {
    futures::stream::iter(projects.iter().map(|project| async move {
        let meta = fetch_metadata(http, gateway, &project.content_pointer).await;
        (project.project_id, meta)
    }))
    .buffer_unordered(MAX_CONCURRENT_FETCHES)
    .filter_map(|(project_id, meta)| async move { meta.map(|m| (project_id, m)) })
    .collect()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_pointer_resolves_to_nothing_without_a_fetch() {
        let http = reqwest::Client::new();
        assert!(fetch_metadata(&http, "https://gw.example/ipfs/", "  ").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_gateway_is_non_fatal() {
        let http = reqwest::Client::new();
        // Discard port; the connection is refused immediately. The pointer is
        // an http URL so no public-gateway fallback is attempted.
        let meta = fetch_metadata(&http, "http://127.0.0.1:9/ipfs/", "http://127.0.0.1:9/meta.json")
            .await;
        assert!(meta.is_none());
    }

    #[test]
    fn a_failing_primary_gateway_gets_the_public_fallback() {
        let urls = candidate_urls("https://gw.example/ipfs/", "bafyabc");
        assert_eq!(
            urls,
            vec![
                "https://gw.example/ipfs/bafyabc".to_string(),
                format!("{FALLBACK_GATEWAY}bafyabc"),
            ]
        );
    }

    #[test]
    fn the_fallback_gateway_is_not_tried_twice() {
        assert_eq!(
            candidate_urls(FALLBACK_GATEWAY, "bafyabc"),
            vec![format!("{FALLBACK_GATEWAY}bafyabc")]
        );
    }

    #[test]
    fn absolute_pointers_resolve_to_themselves_only() {
        assert_eq!(
            candidate_urls("https://gw.example/ipfs/", "https://cdn.example/m.json"),
            vec!["https://cdn.example/m.json".to_string()]
        );
    }
}
