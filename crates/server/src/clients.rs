//! Open client contexts and the take-over signal.
//!
//! The lifecycle controller never reaches into clients directly; it drives
//! this signal after install (adopt waiting clients eagerly) and after
//! activate (bind every open context to the new version, so none continues
//! observing a deleted store).

use std::collections::HashMap;
use std::sync::Mutex;

/// Control surface the lifecycle controller invokes to move client
/// contexts onto the latest version without a full reload.
pub trait TakeoverSignal: Send + Sync {
    /// Signal, after a successful install, that pending clients should be
    /// adopted as soon as possible rather than waiting for the previous
    /// version to finish its natural lifetime.
    fn request_takeover(&self, version: &str);

    /// Bind every open client context to the given version. Runs after
    /// activation completes.
    fn claim(&self, version: &str);
}

/// In-memory registry of open client contexts and their bound versions.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    bound: HashMap<String, Option<String>>,
    pending: Option<String>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open client context, bound to the version that is
    /// active at registration time (None before any activation).
    pub fn register(&self, client_id: &str, version: Option<String>) {
        let mut state = self.inner.lock().unwrap();
        state.bound.insert(client_id.to_string(), version);
    }

    /// The version a client context currently observes.
    pub fn bound_version(&self, client_id: &str) -> Option<String> {
        let state = self.inner.lock().unwrap();
        state.bound.get(client_id).cloned().flatten()
    }

    /// The version waiting to take over, if an install has signaled one.
    pub fn pending_version(&self) -> Option<String> {
        self.inner.lock().unwrap().pending.clone()
    }
}

impl TakeoverSignal for ClientRegistry {
    fn request_takeover(&self, version: &str) {
        let mut state = self.inner.lock().unwrap();
        state.pending = Some(version.to_string());
        tracing::debug!(version, "take-over requested for pending clients");
    }

    fn claim(&self, version: &str) {
        let mut state = self.inner.lock().unwrap();
        for bound in state.bound.values_mut() {
            *bound = Some(version.to_string());
        }
        if state.pending.as_deref() == Some(version) {
            state.pending = None;
        }
        tracing::info!(version, clients = state.bound.len(), "claimed open client contexts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_bound_version() {
        let registry = ClientRegistry::new();
        registry.register("tab-1", Some("v1".to_string()));
        registry.register("tab-2", None);

        assert_eq!(registry.bound_version("tab-1"), Some("v1".to_string()));
        assert_eq!(registry.bound_version("tab-2"), None);
        assert_eq!(registry.bound_version("tab-3"), None);
    }

    #[test]
    fn test_claim_rebinds_every_context() {
        let registry = ClientRegistry::new();
        registry.register("tab-1", Some("v1".to_string()));
        registry.register("tab-2", Some("v1".to_string()));

        registry.claim("v2");

        assert_eq!(registry.bound_version("tab-1"), Some("v2".to_string()));
        assert_eq!(registry.bound_version("tab-2"), Some("v2".to_string()));
    }

    #[test]
    fn test_request_takeover_records_pending() {
        let registry = ClientRegistry::new();
        registry.request_takeover("v2");
        assert_eq!(registry.pending_version(), Some("v2".to_string()));
    }

    #[test]
    fn test_claim_clears_matching_pending() {
        let registry = ClientRegistry::new();
        registry.register("tab-1", Some("v1".to_string()));
        registry.request_takeover("v2");

        registry.claim("v2");

        assert_eq!(registry.pending_version(), None);
        assert_eq!(registry.bound_version("tab-1"), Some("v2".to_string()));
    }
}
