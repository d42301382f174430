//! Intercepted request identity.

use crate::cache::key::request_key;
use url::Url;

/// One intercepted outbound request.
///
/// The URL is expected to be canonical (fragment stripped, query preserved);
/// the client crate's `canonicalize` produces that form. Routing decisions
/// look only at the path component, while the cache key covers the full
/// normalized request.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub method: String,
    pub url: Url,
    pub body: Option<Vec<u8>>,
}

impl ResourceRequest {
    /// Build a retrieval-style request, the kind manifest population issues.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, body: None }
    }

    /// Build a request with an explicit method and optional body.
    pub fn new(method: impl Into<String>, url: Url, body: Option<Vec<u8>>) -> Self {
        Self { method: method.into(), url, body }
    }

    /// The path component, without query string or fragment.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The cache key identifying this request in a store.
    pub fn key(&self) -> String {
        request_key(&self.method, self.url.as_str(), "")
    }
}
