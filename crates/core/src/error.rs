//! Unified error types for swcache.

use tokio_rusqlite::rusqlite;

/// Failure of the network fetch capability.
///
/// Passthrough requests hand these back to the caller untouched, so they
/// describe the transport failure only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// Host-imposed timeout elapsed.
    #[error("request timeout after {0}ms")]
    Timeout(u64),

    /// Response body exceeded the configured byte limit.
    #[error("response too large: {0}")]
    TooLarge(String),

    /// The request could not be turned into a network call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Unified error types for the engine, store and lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty version tag).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored response could not be encoded or decoded.
    #[error("CACHE_ERROR: codec: {0}")]
    Codec(String),

    /// A manifest entry could not be fetched during install.
    #[error("PRECACHE_FAILED: {url}: {reason}")]
    PrecacheFailed { url: String, reason: String },

    /// Requests were routed to a worker that has not finished activation.
    #[error("NOT_ACTIVATED: worker is {0}")]
    NotActivated(String),

    /// Lifecycle step invoked from a state that does not allow it.
    #[error("INVALID_STATE: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Network failure on a passthrough request.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}
