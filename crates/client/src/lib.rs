//! Host side of swcache.
//!
//! This crate provides the reqwest-backed `Fetcher` and the wiring that turns
//! an `AppConfig` into a ready-to-install `Worker` over a SQLite bucket store.

pub mod error;
pub mod fetch;
pub mod host;

pub use error::ClientError;
pub use fetch::{FetchConfig, HttpFetcher};
pub use host::open_worker;
