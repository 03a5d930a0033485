//! Reform pipeline: strips the control-plane envelope and restores the
//! request's vendor-bound URL, host, and header set, grounded in
//! `provider.go`'s `reformRequest`.

use axum::http::Uri;
use axum::http::header::HOST;

use crate::body::RequestParts;
use crate::error::{ProxyError, Result};

pub const ORIGIN_URI_HEADER: &str = "X-Mcdn-Origin-Uri";
pub const ORIGIN_HOST_HEADER: &str = "X-Origin-Host";
pub const KEPT_HEADERS_HEADER: &str = "X-Mcdn-Kept-Headers";
pub const CLOUD_ACCOUNT_ID_HEADER: &str = "X-Mcdn-Cloud-Account-Id";
pub const CLOUD_ACCOUNT_NAME_HEADER: &str = "X-Mcdn-Cloud-Account-Name";
pub const VENDOR_NAME_HEADER: &str = "X-Mcdn-Vendor-Name";
pub const TOP_ACCOUNT_ID_HEADER: &str = "X-Mcdn-Top-Account-Id";
pub const SUB_PRODUCT_HEADER: &str = "X-Mcdn-Cloud-Account-SubProject";
pub const REQUEST_ID_HEADER: &str = "X-Mcdn-Request-Id";

const ENVELOPE_HEADERS: &[&str] = &[
    ORIGIN_HOST_HEADER,
    CLOUD_ACCOUNT_ID_HEADER,
    CLOUD_ACCOUNT_NAME_HEADER,
    KEPT_HEADERS_HEADER,
    ORIGIN_URI_HEADER,
    VENDOR_NAME_HEADER,
    TOP_ACCOUNT_ID_HEADER,
    REQUEST_ID_HEADER,
];

/// Reverts a reformed request to the shape the vendor would see directly.
/// Idempotent: a second pass finds no kept-headers/origin-uri left to act
/// on and is a no-op.
pub fn reform(parts: &mut RequestParts) -> Result<()> {
    // A second pass finds no X-Mcdn-Origin-Uri left (consumed by the first):
    // the request is already reformed, so there's nothing further to do.
    let Some(origin_uri) = parts.header_str(ORIGIN_URI_HEADER).map(str::to_string) else {
        return Ok(());
    };
    let kept_headers = parts.header_str(KEPT_HEADERS_HEADER).unwrap_or("").to_lowercase();
    let keep: Vec<&str> = kept_headers.split(',').map(str::trim).collect();

    if keep.contains(&"host")
        && let Some(origin_host) = parts.header_str(ORIGIN_HOST_HEADER).map(str::to_string)
    {
        parts.set_header("host", &origin_host);
    }

    let drop: Vec<String> = parts
        .headers
        .keys()
        .filter(|name| !keep.contains(&name.as_str()))
        .map(|name| name.as_str().to_string())
        .collect();
    for name in drop {
        parts.remove_header(&name);
    }

    for header in ENVELOPE_HEADERS {
        parts.remove_header(header);
    }

    let uri: Uri = origin_uri
        .parse()
        .map_err(|e| ProxyError::reform_request_internal_err(format!("parse origin uri failed: {e}")))?;
    parts.host = uri
        .authority()
        .map(|a| a.to_string())
        .unwrap_or_default();
    parts.uri = uri;
    if !parts.host.is_empty() && parts.headers.get(HOST).is_none() {
        parts.set_header("host", &parts.host.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method, Uri};

    fn reformable_request() -> RequestParts {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN_URI_HEADER, "https://cdn.example.com/path?a=1".parse().unwrap());
        headers.insert(KEPT_HEADERS_HEADER, "host,authorization".parse().unwrap());
        headers.insert(ORIGIN_HOST_HEADER, "cdn.example.com".parse().unwrap());
        headers.insert(CLOUD_ACCOUNT_NAME_HEADER, "acc".parse().unwrap());
        headers.insert("authorization", "Bearer xyz".parse().unwrap());
        headers.insert("x-random-header", "drop-me".parse().unwrap());
        RequestParts {
            method: Method::GET,
            uri: Uri::from_static("https://proxy.internal/path?a=1"),
            host: "proxy.internal".into(),
            headers,
            body: Default::default(),
        }
    }

    #[test]
    fn strips_envelope_and_restores_target() {
        let mut parts = reformable_request();
        reform(&mut parts).unwrap();
        assert_eq!(parts.uri.to_string(), "https://cdn.example.com/path?a=1");
        assert_eq!(parts.host, "cdn.example.com");
        assert!(parts.header_str("authorization").is_some());
        assert!(parts.header_str("x-random-header").is_none());
        assert!(parts.header_str(ORIGIN_URI_HEADER).is_none());
        assert!(parts.header_str(CLOUD_ACCOUNT_NAME_HEADER).is_none());
    }

    #[test]
    fn is_idempotent() {
        let mut parts = reformable_request();
        reform(&mut parts).unwrap();
        let once = parts.clone();
        reform(&mut parts).unwrap();
        assert_eq!(once.uri, parts.uri);
        assert_eq!(once.headers, parts.headers);
    }

    #[test]
    fn rejects_unparseable_origin_uri() {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN_URI_HEADER, "http://bad host/path".parse().unwrap());
        let mut parts = RequestParts {
            method: Method::GET,
            uri: Uri::from_static("https://proxy.internal/"),
            host: "proxy.internal".into(),
            headers,
            body: Default::default(),
        };
        assert!(reform(&mut parts).is_err());
    }
}
