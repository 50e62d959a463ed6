//! Core types and request-routing engine for swcache.
//!
//! This crate provides:
//! - Versioned bucket store with SQLite and in-memory backends
//! - Origin policy and request classification
//! - Fetch/serve strategies with offline fallback
//! - Install/activate lifecycle for a deployment version
//! - Unified error types and layered configuration

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod policy;
pub mod request;
pub mod resolve;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{BucketName, BucketRole, BucketSet, BucketStore, MemoryBucketStore, SqliteBucketStore, VersionTag};
pub use classify::{RequestCategory, classify};
pub use config::{AppConfig, ConfigError, Settings};
pub use engine::{Engine, Served, Source};
pub use error::{Error, FetchError};
pub use fetch::{CacheMode, Fetcher};
pub use lifecycle::{BucketSummary, Worker, WorkerState};
pub use policy::OriginPolicy;
pub use request::{Request, RequestKey, RequestMode, Response};
