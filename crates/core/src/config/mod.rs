//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (VESTIBULE_*)
//! 2. TOML config file (if VESTIBULE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (VESTIBULE_*)
/// 2. TOML config file (if VESTIBULE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via VESTIBULE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the interception surface listens on.
    ///
    /// Set via VESTIBULE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Origin every intercepted request is resolved against.
    ///
    /// Set via VESTIBULE_UPSTREAM_ORIGIN environment variable.
    #[serde(default = "default_upstream_origin")]
    pub upstream_origin: String,

    /// Reserved path prefix routed network-first instead of cache-first.
    ///
    /// Set via VESTIBULE_API_PREFIX environment variable.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Version tag of the deployment this process serves.
    ///
    /// Set via VESTIBULE_CACHE_VERSION environment variable. Bump it on
    /// every deployment to retire the previous store at activation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Resource paths populated into a newly installed store.
    ///
    /// Set via VESTIBULE_MANIFEST environment variable. Fixed per
    /// deployment; install fails unless every path fetches successfully.
    #[serde(default)]
    pub manifest: Vec<String>,

    /// User-Agent string for upstream requests.
    ///
    /// Set via VESTIBULE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to accept per upstream response.
    ///
    /// Set via VESTIBULE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via VESTIBULE_TIMEOUT_MS environment variable. Unset means the
    /// transport's own timeout behavior applies; 20000 is a reasonable
    /// value when an explicit bound is wanted.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./vestibule-cache.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_upstream_origin() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_user_agent() -> String {
    "vestibule/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            upstream_origin: default_upstream_origin(),
            api_prefix: default_api_prefix(),
            cache_version: default_cache_version(),
            manifest: Vec::new(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio, if one is set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `VESTIBULE_`
    /// 2. TOML file from `VESTIBULE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("VESTIBULE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("VESTIBULE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
