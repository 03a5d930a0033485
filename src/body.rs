use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, Uri};
use std::str::FromStr;

use crate::error::{ProxyError, Result};

/// A request read into plain owned data: one physical body read feeds
/// every later validate/resign/forward pass (spec §4.1).
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub uri: Uri,
    pub host: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestParts {
    pub async fn from_request(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Body,
    ) -> Result<Self> {
        let body = buffer_body(body).await?;
        let host = headers
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Ok(Self {
            method,
            uri,
            host,
            headers,
            body,
        })
    }

    pub fn query(&self) -> &str {
        self.uri.query().unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Reads a header's value, removing it from the request in the same
    /// step. The vendor signers use this wherever the original providers
    /// call `req.Header.Del` right after reading the inbound signature.
    pub fn take_header(&mut self, name: &str) -> Option<String> {
        let value = self.header_str(name).map(str::to_string);
        if let Ok(name) = HeaderName::from_str(name) {
            self.headers.remove(name);
        }
        value
    }

    pub fn remove_header(&mut self, name: &str) {
        if let Ok(name) = HeaderName::from_str(name) {
            self.headers.remove(name);
        }
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
    }

    /// The request's authority, preferring the URI's own (set once the
    /// request has been reformed to an absolute vendor URL) and falling
    /// back to the inbound `Host` header.
    pub fn authority(&self) -> String {
        self.uri
            .authority()
            .map(|a| a.to_string())
            .unwrap_or_else(|| self.host.clone())
    }

    /// Rewrites the URI's query string in place, keeping scheme/authority/
    /// path untouched. Vendors that sign over query parameters (Aliyun,
    /// Baishan) use this to rewrite the inbound request after resigning.
    pub fn set_query(&mut self, query: &str) {
        let path = self.uri.path();
        let path_and_query = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };
        let mut parts = self.uri.clone().into_parts();
        parts.path_and_query = Some(
            axum::http::uri::PathAndQuery::from_str(&path_and_query)
                .unwrap_or_else(|_| axum::http::uri::PathAndQuery::from_static("/")),
        );
        if let Ok(uri) = Uri::from_parts(parts) {
            self.uri = uri;
        }
    }

    /// Replaces the body and keeps `Content-Length` in sync, mirroring
    /// UCloud's `setBody` which re-encodes the signed form payload.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.set_header("content-length", &body.len().to_string());
        self.body = Bytes::from(body);
    }
}

/// Reads the whole body once. Empty bodies come back as an empty slice,
/// never `None`; idempotent in the sense that the bytes returned here are
/// handed to every later caller by value, not re-read from the wire.
pub async fn buffer_body(body: Body) -> Result<Bytes> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::internal(format!("failed to read request body: {e}")))
}
