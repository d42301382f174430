//! Per-request routing between the network and the active store.
//!
//! Every intercepted request is classified by its path component alone:
//! under the reserved API prefix it resolves network-first, everything else
//! cache-first. Classification is exhaustive, so no request is ever left
//! unhandled; the cache-first arm is the default.
//!
//! The router only reads the store. A cache-first miss that resolves over
//! the network is returned without being inserted; the lifecycle controller
//! stays the sole writer.

use std::sync::Arc;

use vestibule_client::{FetchResponse, Network};
use vestibule_core::{CacheDb, Error, ResourceRequest, StoredEntry};

/// Resolution strategy chosen for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Prefer a live response; fall back to the active store on transport
    /// failure.
    NetworkFirst,
    /// Prefer the active store; fall back to the network on a miss.
    CacheFirst,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedSource {
    Network,
    Cache,
}

/// A response ready to hand back to the intercepted caller.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ServedSource,
}

impl ServedResponse {
    fn from_network(response: FetchResponse) -> Self {
        Self {
            status: response.status.as_u16(),
            content_type: response.content_type,
            body: response.bytes.to_vec(),
            source: ServedSource::Network,
        }
    }

    fn from_cache(entry: StoredEntry) -> Self {
        Self {
            status: entry.status_code,
            content_type: entry.content_type,
            body: entry.body,
            source: ServedSource::Cache,
        }
    }
}

/// Routes every intercepted request, reading the active store and the
/// network collaborator.
pub struct RequestRouter {
    db: CacheDb,
    network: Arc<dyn Network>,
    api_prefix: String,
}

impl RequestRouter {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, api_prefix: impl Into<String>) -> Self {
        Self { db, network, api_prefix: api_prefix.into() }
    }

    /// Classify a request by its path component. Query string and fragment
    /// never participate.
    pub fn classify(&self, request: &ResourceRequest) -> RoutePolicy {
        if request.path().starts_with(&self.api_prefix) {
            RoutePolicy::NetworkFirst
        } else {
            RoutePolicy::CacheFirst
        }
    }

    /// Resolve a request to a response.
    ///
    /// # Errors
    ///
    /// A failure is surfaced exactly as an ordinary failed request would
    /// be: network-first propagates the network error when no cached entry
    /// exists; cache-first propagates it on a miss.
    pub async fn route(&self, request: &ResourceRequest) -> Result<ServedResponse, Error> {
        match self.classify(request) {
            RoutePolicy::NetworkFirst => self.network_first(request).await,
            RoutePolicy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn lookup(&self, request: &ResourceRequest) -> Result<Option<StoredEntry>, Error> {
        let Some(tag) = self.db.active_store().await? else {
            return Ok(None);
        };
        self.db.get_entry(&tag, &request.key()).await
    }

    async fn network_first(&self, request: &ResourceRequest) -> Result<ServedResponse, Error> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(ServedResponse::from_network(response)),
            Err(net_err) => match self.lookup(request).await? {
                Some(entry) => {
                    tracing::debug!(path = request.path(), error = %net_err, "network failed, serving cached entry");
                    Ok(ServedResponse::from_cache(entry))
                }
                None => Err(net_err),
            },
        }
    }

    async fn cache_first(&self, request: &ResourceRequest) -> Result<ServedResponse, Error> {
        if let Some(entry) = self.lookup(request).await? {
            tracing::debug!(path = request.path(), "serving cached entry");
            return Ok(ServedResponse::from_cache(entry));
        }
        let response = self.network.fetch(request).await?;
        Ok(ServedResponse::from_network(response))
    }
}
