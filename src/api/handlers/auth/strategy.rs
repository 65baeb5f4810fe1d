//! Per-request strategy selection from the `Host` header.

use axum::http::HeaderMap;
use axum::http::header::HOST;

/// Derive the strategy id for a request: `<prefix>:<host>` with any port
/// suffix stripped. Pure and deterministic; a missing or unreadable `Host`
/// header falls back to `default_host`.
#[must_use]
pub fn select_strategy(prefix: &str, host_header: Option<&str>, default_host: &str) -> String {
    let host = host_header
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default_host);
    let host = host.split(':').next().unwrap_or(default_host);
    format!("{prefix}:{host}")
}

/// Request host as sent by the client, if any.
#[must_use]
pub fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers.get(HOST).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn port_suffix_is_stripped() {
        assert_eq!(
            select_strategy("oidc", Some("shop.example:8443"), "fallback.example"),
            select_strategy("oidc", Some("shop.example"), "fallback.example"),
        );
        assert_eq!(
            select_strategy("oidc", Some("shop.example:8443"), "fallback.example"),
            "oidc:shop.example"
        );
    }

    #[test]
    fn selection_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(
                select_strategy("oidc", Some("market.example"), "fallback.example"),
                "oidc:market.example"
            );
        }
    }

    #[test]
    fn missing_or_empty_host_uses_default() {
        assert_eq!(
            select_strategy("oidc", None, "fallback.example"),
            "oidc:fallback.example"
        );
        assert_eq!(
            select_strategy("oidc", Some("  "), "fallback.example"),
            "oidc:fallback.example"
        );
    }

    #[test]
    fn request_host_reads_header() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("shop.example:443"));
        assert_eq!(request_host(&headers), Some("shop.example:443"));
        assert_eq!(request_host(&HeaderMap::new()), None);
    }
}
