//! Engine configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Configuration is read once at construction; the engine never re-reads it.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::VersionTag;
use crate::policy::OriginPolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
///
/// List values in the environment use figment's array syntax, e.g.
/// `SWCACHE_DENY_PREFIXES='["https://plausible.io"]'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment identifier; bucket names are derived from it.
    ///
    /// Set via SWCACHE_VERSION_TAG environment variable.
    #[serde(default = "default_version_tag")]
    pub version_tag: String,

    /// Origin the intercepted client is served from.
    ///
    /// Set via SWCACHE_BASE_ORIGIN environment variable.
    #[serde(default = "default_base_origin")]
    pub base_origin: String,

    /// Assets populated into the static bucket at install, in order.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// URL prefixes that are never cached or intercepted.
    #[serde(default)]
    pub deny_prefixes: Vec<String>,

    /// Path of the offline page served to navigations with nothing cached.
    ///
    /// Set via SWCACHE_OFFLINE_PATH environment variable.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Path to SQLite bucket database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SWCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SWCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds, imposed by the host fetcher.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects the host fetcher follows.
    ///
    /// Set via SWCACHE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_version_tag() -> String {
    "v1".into()
}

fn default_base_origin() -> String {
    "http://localhost:8080".into()
}

fn default_precache() -> Vec<String> {
    ["/", "/index.html", "/favicon.png", "/icon-192.png", "/offline.html"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_path() -> String {
    "/offline.html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version_tag: default_version_tag(),
            base_origin: default_base_origin(),
            precache: default_precache(),
            deny_prefixes: Vec::new(),
            offline_path: default_offline_path(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Resolve the raw values into the immutable engine settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a URL or path cannot be resolved.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        self.validate()?;

        let version = VersionTag::new(self.version_tag.clone())
            .map_err(|e| ConfigError::Invalid { field: "version_tag".into(), reason: e.to_string() })?;
        let base = parse_base_origin(&self.base_origin)?;
        let policy = OriginPolicy::new(base, self.deny_prefixes.clone());

        let precache = self
            .precache
            .iter()
            .map(|entry| {
                policy
                    .resolve(entry)
                    .map_err(|e| ConfigError::Invalid { field: "precache".into(), reason: format!("{entry}: {e}") })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let offline_page = policy
            .resolve(&self.offline_path)
            .map_err(|e| ConfigError::Invalid { field: "offline_path".into(), reason: e.to_string() })?;

        Ok(Settings { version, policy, precache, offline_page })
    }
}

pub(crate) fn parse_base_origin(input: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(input)
        .map_err(|e| ConfigError::Invalid { field: "base_origin".into(), reason: e.to_string() })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Invalid {
            field: "base_origin".into(),
            reason: "must be an http(s) URL with a host".into(),
        });
    }
    Ok(url)
}

/// Resolved, immutable engine configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub version: VersionTag,
    pub policy: OriginPolicy,
    /// Absolute manifest URLs, in manifest order.
    pub precache: Vec<Url>,
    /// Absolute URL of the offline page in the static bucket.
    pub offline_page: Url,
}
