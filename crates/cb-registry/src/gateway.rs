//! Content-pointer to gateway-URL translation.

/// Public gateway retried when the configured one fails to serve a document.
pub const FALLBACK_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Turn a stored content pointer into a fetchable HTTP URL.
///
/// Pointers appear in three forms: `ipfs://<cid>[/path]`, a full
/// `http(s)://` URL (passed through untouched), or a bare CID. The first and
/// last are resolved against `base`, which may or may not carry a trailing
/// slash.
pub fn to_gateway_url(base: &str, pointer: &str) -> String {
    let pointer = pointer.trim();
    if pointer.starts_with("http://") || pointer.starts_with("https://") {
        return pointer.to_string();
    }
    let rest = pointer.strip_prefix("ipfs://").unwrap_or(pointer);
    format!("{}/{}", base.trim_end_matches('/'), rest.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipfs_scheme_is_rewritten_to_the_gateway() {
        assert_eq!(
            to_gateway_url("https://gw.example/ipfs/", "ipfs://bafy123/cover.png"),
            "https://gw.example/ipfs/bafy123/cover.png"
        );
    }

    #[test]
    fn http_urls_pass_through() {
        assert_eq!(
            to_gateway_url("https://gw.example/ipfs/", "https://other.example/x.json"),
            "https://other.example/x.json"
        );
    }

    #[test]
    fn bare_cids_are_prefixed() {
        assert_eq!(
            to_gateway_url("https://gw.example/ipfs", "bafy123"),
            "https://gw.example/ipfs/bafy123"
        );
    }
}
