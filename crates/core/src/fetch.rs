//! Network fetch port.
//!
//! The engine never talks to the network directly; the host injects a
//! `Fetcher`. `swcache-client` provides the reqwest-backed implementation.

use crate::error::FetchError;
use crate::request::{Request, Response};

/// Whether intermediate HTTP caches may answer the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Go to the origin server, bypassing intermediate caches.
    NoStore,
    /// Unmanaged request: the fetcher applies no limits beyond its timeout.
    Passthrough,
}

/// Standard network fetch capability: request in, response or failure out.
///
/// HTTP error statuses are responses, not failures.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request, cache: CacheMode) -> Result<Response, FetchError>;
}
