//! Deployment lifecycle: install a versioned store, then activate it.
//!
//! One controller instance owns one deployment transition. Install
//! populates a new store from the manifest as a single all-or-nothing unit;
//! activate retires every other store and binds open clients to the new
//! version. Activate is the only operation that deletes stores.

use std::sync::{Arc, Mutex};

use url::Url;
use vestibule_client::{FetchResponse, Network};
use vestibule_core::{CacheDb, Error, ResourceRequest, StoredEntry};

use crate::clients::TakeoverSignal;

/// Phases a deployment version moves through.
///
/// `Active` is terminal until a newer version restarts the cycle under its
/// own tag, at which point the old store becomes a deletion target of the
/// next activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninstalled,
    Installing,
    Installed,
    Activating,
    Active,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone)]
pub struct ActivationReport {
    /// Tag of the store now active.
    pub activated: String,
    /// Stale stores removed by this activation.
    pub deleted: Vec<String>,
    /// Stale stores that could not be removed. Non-fatal; the next
    /// activation re-enumerates and retries.
    pub failed_deletes: Vec<String>,
}

/// Drives the cache from "no version installed" through "version installed"
/// to "version active", retiring all other versions.
///
/// The controller is the sole writer of the store; the router only reads.
/// Lifecycle failures stay contained here and are never surfaced to the
/// router.
pub struct LifecycleController {
    db: CacheDb,
    network: Arc<dyn Network>,
    clients: Arc<dyn TakeoverSignal>,
    origin: Url,
    phase: Mutex<LifecyclePhase>,
}

impl LifecycleController {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, clients: Arc<dyn TakeoverSignal>, origin: Url) -> Self {
        Self { db, network, clients, origin, phase: Mutex::new(LifecyclePhase::Uninstalled) }
    }

    /// The phase of the transition this controller is driving.
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock().unwrap()
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        *self.phase.lock().unwrap() = phase;
    }

    /// Install a version: create its store and populate every manifest
    /// resource from the network.
    ///
    /// All-or-nothing: if any resource fails to fetch (transport error or
    /// non-success status), the whole install fails, the partially
    /// populated store is removed best-effort, and the previously active
    /// store stays untouched and keeps serving. On success the controller
    /// signals that pending clients should be taken over eagerly.
    ///
    /// # Errors
    ///
    /// `Error::InstallFailed` when a manifest resource cannot be fetched;
    /// `Error::InvalidInput` when `version` is the currently active tag.
    pub async fn install(&self, manifest: &[String], version: &str) -> Result<(), Error> {
        if self.db.active_store().await?.as_deref() == Some(version) {
            return Err(Error::InvalidInput(format!("version {version} is already active")));
        }

        let prior = self.phase();
        self.set_phase(LifecyclePhase::Installing);

        if let Err(err) = self.db.open_or_create_store(version).await {
            self.set_phase(prior);
            return Err(err);
        }

        if let Err(err) = self.populate(manifest, version).await {
            if let Err(cleanup) = self.db.delete_store(version).await {
                tracing::warn!(version, error = %cleanup, "failed to remove partially populated store");
            }
            self.set_phase(prior);
            return Err(err);
        }

        self.set_phase(LifecyclePhase::Installed);
        tracing::info!(version, resources = manifest.len(), "installed version");
        self.clients.request_takeover(version);
        Ok(())
    }

    async fn populate(&self, manifest: &[String], version: &str) -> Result<(), Error> {
        for path in manifest {
            let url = self.origin.join(path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            let request = ResourceRequest::get(url);

            let response = self.network.fetch(&request).await.map_err(|e| Error::InstallFailed {
                version: version.to_string(),
                resource: path.clone(),
                reason: e.to_string(),
            })?;

            if !response.status.is_success() {
                return Err(Error::InstallFailed {
                    version: version.to_string(),
                    resource: path.clone(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }

            self.db.put_entry(version, &snapshot_entry(&request, &response)).await?;
        }
        Ok(())
    }

    /// Activate an installed version: delete every other store, mark this
    /// one active, and claim every open client context.
    ///
    /// Deletion of an individual stale store is best-effort; a failure is
    /// logged and reported but never blocks activation. Calling activate
    /// again for the already-active tag succeeds and deletes nothing.
    ///
    /// # Errors
    ///
    /// `Error::StoreMissing` when no store exists for `version`.
    pub async fn activate(&self, version: &str) -> Result<ActivationReport, Error> {
        let stores = self.db.list_stores().await?;
        if !stores.iter().any(|tag| tag == version) {
            return Err(Error::StoreMissing(version.to_string()));
        }

        self.set_phase(LifecyclePhase::Activating);

        let mut deleted = Vec::new();
        let mut failed_deletes = Vec::new();
        for tag in stores.iter().filter(|tag| tag.as_str() != version) {
            match self.db.delete_store(tag).await {
                Ok(_) => deleted.push(tag.clone()),
                Err(err) => {
                    tracing::warn!(%tag, error = %err, "failed to delete stale store");
                    failed_deletes.push(tag.clone());
                }
            }
        }

        self.db.set_active_store(version).await?;
        self.clients.claim(version);
        self.set_phase(LifecyclePhase::Active);
        tracing::info!(version, deleted = deleted.len(), "activated version");

        Ok(ActivationReport { activated: version.to_string(), deleted, failed_deletes })
    }
}

/// Capture a fetched response as an immutable stored entry.
fn snapshot_entry(request: &ResourceRequest, response: &FetchResponse) -> StoredEntry {
    let headers: serde_json::Map<String, serde_json::Value> = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), serde_json::Value::String(v.to_string())))
        })
        .collect();
    let headers_json = if headers.is_empty() { None } else { serde_json::to_string(&headers).ok() };

    StoredEntry {
        key: request.key(),
        method: request.method.clone(),
        url: request.url.as_str().to_string(),
        status_code: response.status.as_u16(),
        content_type: response.content_type.clone(),
        headers_json,
        body: response.bytes.to_vec(),
        stored_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientRegistry;
    use bytes::Bytes;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vestibule_core::cache::key::request_key;

    #[derive(Default)]
    struct FakeNetwork {
        responses: HashMap<String, (u16, Vec<u8>)>,
        fail: HashSet<String>,
        hits: AtomicUsize,
    }

    impl FakeNetwork {
        fn with_body(mut self, url: &str, body: &[u8]) -> Self {
            self.responses.insert(url.to_string(), (200, body.to_vec()));
            self
        }

        fn with_status(mut self, url: &str, status: u16) -> Self {
            self.responses.insert(url.to_string(), (status, Vec::new()));
            self
        }

        fn failing(mut self, url: &str) -> Self {
            self.fail.insert(url.to_string());
            self
        }
    }

    #[async_trait::async_trait]
    impl Network for FakeNetwork {
        async fn fetch(&self, request: &ResourceRequest) -> Result<FetchResponse, Error> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let url = request.url.as_str();
            if self.fail.contains(url) {
                return Err(Error::Network(format!("connection refused: {url}")));
            }
            let Some((status, body)) = self.responses.get(url) else {
                return Err(Error::Network(format!("no route to {url}")));
            };
            Ok(FetchResponse {
                url: request.url.clone(),
                final_url: request.url.clone(),
                status: reqwest::StatusCode::from_u16(*status).unwrap(),
                content_type: Some("text/plain".to_string()),
                bytes: Bytes::from(body.clone()),
                headers: Default::default(),
                fetch_ms: 1,
            })
        }
    }

    fn origin() -> Url {
        Url::parse("http://app.local").unwrap()
    }

    fn manifest(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn controller(db: &CacheDb, network: Arc<FakeNetwork>) -> (LifecycleController, Arc<ClientRegistry>) {
        let registry = Arc::new(ClientRegistry::new());
        let controller = LifecycleController::new(db.clone(), network, registry.clone(), origin());
        (controller, registry)
    }

    #[tokio::test]
    async fn test_install_populates_every_manifest_resource() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(
            FakeNetwork::default()
                .with_body("http://app.local/", b"index")
                .with_body("http://app.local/input", b"form")
                .with_body("http://app.local/manifest.json", b"{}"),
        );
        let (controller, registry) = controller(&db, network);

        controller
            .install(&manifest(&["/", "/input", "/manifest.json"]), "v1")
            .await
            .unwrap();

        assert_eq!(controller.phase(), LifecyclePhase::Installed);
        assert_eq!(db.entry_count("v1").await.unwrap(), 3);
        assert_eq!(registry.pending_version(), Some("v1".to_string()));

        let key = request_key("GET", "http://app.local/input", "");
        let entry = db.get_entry("v1", &key).await.unwrap().unwrap();
        assert_eq!(entry.body, b"form".to_vec());
        assert_eq!(entry.status_code, 200);
    }

    #[tokio::test]
    async fn test_install_then_activate_leaves_single_active_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::default().with_body("http://app.local/input", b"form"));
        let (controller, registry) = controller(&db, network);
        registry.register("tab-1", None);

        controller.install(&manifest(&["/input"]), "v1").await.unwrap();
        controller.activate("v1").await.unwrap();
        controller.install(&manifest(&["/input"]), "v2").await.unwrap();
        let report = controller.activate("v2").await.unwrap();

        assert_eq!(db.list_stores().await.unwrap(), vec!["v2".to_string()]);
        assert_eq!(db.active_store().await.unwrap(), Some("v2".to_string()));
        assert_eq!(report.deleted, vec!["v1".to_string()]);
        assert!(report.failed_deletes.is_empty());
        assert_eq!(registry.bound_version("tab-1"), Some("v2".to_string()));
        assert_eq!(controller.phase(), LifecyclePhase::Active);
    }

    #[tokio::test]
    async fn test_install_is_atomic_and_preserves_prior_version() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(
            FakeNetwork::default()
                .with_body("http://app.local/a", b"alpha")
                .with_body("http://app.local/c", b"gamma")
                .failing("http://app.local/b"),
        );
        let (controller, _registry) = controller(&db, network);

        controller.install(&manifest(&["/a"]), "v1").await.unwrap();
        controller.activate("v1").await.unwrap();

        let result = controller.install(&manifest(&["/a", "/b", "/c"]), "v3").await;
        assert!(matches!(
            result,
            Err(Error::InstallFailed { version, resource, .. })
                if version == "v3" && resource == "/b"
        ));

        assert_eq!(db.list_stores().await.unwrap(), vec!["v1".to_string()]);
        assert_eq!(db.active_store().await.unwrap(), Some("v1".to_string()));
        assert_eq!(controller.phase(), LifecyclePhase::Active);

        let key = request_key("GET", "http://app.local/a", "");
        let entry = db.get_entry("v1", &key).await.unwrap().unwrap();
        assert_eq!(entry.body, b"alpha".to_vec());
    }

    #[tokio::test]
    async fn test_install_fails_on_non_success_status() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::default().with_status("http://app.local/missing", 404));
        let (controller, _registry) = controller(&db, network);

        let result = controller.install(&manifest(&["/missing"]), "v1").await;
        assert!(matches!(
            result,
            Err(Error::InstallFailed { resource, reason, .. })
                if resource == "/missing" && reason.contains("404")
        ));
        assert!(db.list_stores().await.unwrap().is_empty());
        assert_eq!(controller.phase(), LifecyclePhase::Uninstalled);
    }

    #[tokio::test]
    async fn test_install_rejects_currently_active_version() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::default().with_body("http://app.local/input", b"form"));
        let (controller, _registry) = controller(&db, network);

        controller.install(&manifest(&["/input"]), "v1").await.unwrap();
        controller.activate("v1").await.unwrap();

        let result = controller.install(&manifest(&["/input"]), "v1").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_activate_deletes_never_activated_stores_too() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::default().with_body("http://app.local/input", b"form"));
        let (controller, _registry) = controller(&db, network);

        controller.install(&manifest(&["/input"]), "v1").await.unwrap();
        controller.install(&manifest(&["/input"]), "v2").await.unwrap();
        controller.activate("v2").await.unwrap();

        assert_eq!(db.list_stores().await.unwrap(), vec!["v2".to_string()]);
        assert_eq!(db.active_store().await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_activate_unknown_tag() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::default());
        let (controller, _registry) = controller(&db, network);

        let result = controller.activate("v9").await;
        assert!(matches!(result, Err(Error::StoreMissing(tag)) if tag == "v9"));
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FakeNetwork::default().with_body("http://app.local/input", b"form"));
        let (controller, _registry) = controller(&db, network);

        controller.install(&manifest(&["/input"]), "v1").await.unwrap();
        controller.activate("v1").await.unwrap();

        let stores_before = db.list_stores().await.unwrap();
        let active_before = db.active_store().await.unwrap();
        let entries_before = db.entry_count("v1").await.unwrap();

        let report = controller.activate("v1").await.unwrap();

        assert_eq!(db.list_stores().await.unwrap(), stores_before);
        assert_eq!(db.active_store().await.unwrap(), active_before);
        assert_eq!(db.entry_count("v1").await.unwrap(), entries_before);
        assert!(report.deleted.is_empty());
        assert_eq!(controller.phase(), LifecyclePhase::Active);
    }
}
