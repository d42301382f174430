//! vestibule entry point.
//!
//! Boots the interception proxy: installs and activates the configured
//! deployment version, then serves intercepted requests against the
//! upstream origin. Logging goes to stderr.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use vestibule_client::{FetchClient, FetchConfig, canonicalize};
use vestibule_core::CacheDb;
use vestibule_core::config::AppConfig;
use vestibule_server::{ClientRegistry, LifecycleController, RequestRouter, serve};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = canonicalize(&config.upstream_origin)?;

    let db = CacheDb::open(&config.db_path).await?;
    let network = Arc::new(FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })?);
    let registry = Arc::new(ClientRegistry::new());

    let controller = LifecycleController::new(db.clone(), network.clone(), registry.clone(), origin.clone());

    // A failed install is not fatal: the previously active version, if any,
    // keeps serving until a later deployment succeeds.
    match controller.install(&config.manifest, &config.cache_version).await {
        Ok(()) => {
            let report = controller.activate(&config.cache_version).await?;
            tracing::info!(
                version = %report.activated,
                deleted = report.deleted.len(),
                pending_cleanup = report.failed_deletes.len(),
                "deployment version active"
            );
        }
        Err(err) => {
            tracing::error!(error = %err, "install failed; continuing with previously active version");
        }
    }

    let router = RequestRouter::new(db, network, config.api_prefix.clone());
    let state = Arc::new(serve::ProxyState { router, origin, max_body_bytes: config.max_bytes });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, upstream = %config.upstream_origin, "vestibule listening");
    axum::serve(listener, serve::app(state)).await?;

    Ok(())
}
