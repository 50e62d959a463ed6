//! Errors raised while wiring a worker together.

use swcache_core::{ConfigError, Error};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),

    /// The reqwest client could not be built (TLS backend, invalid user agent).
    #[error("HTTP_CLIENT: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Core(#[from] Error),
}
