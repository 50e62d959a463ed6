//! Versioned bucket store.
//!
//! Buckets are named persistent caches of request → response pairs, one
//! per role and deployment version. This module provides:
//!
//! - The `BucketStore` port used by the engine and lifecycle
//! - Bucket naming derived from the version tag
//! - A SQLite backend (persistent, WAL mode, migrations)
//! - An in-memory backend for tests and ephemeral hosts

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::fmt;

pub use crate::Error;
use crate::request::{RequestKey, Response};

pub use connection::SqliteBucketStore;
pub use memory::MemoryBucketStore;

/// Opaque deployment identifier. A new tag means a new set of buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Result<Self, Error> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(Error::InvalidInput("version tag must not be empty".into()));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The semantic role a bucket plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketRole {
    /// Precached assets, including the offline page.
    Static,
    /// Documents stored by the network-first HTML strategy.
    Html,
    /// Assets stored by stale-while-revalidate and remote network-first.
    Runtime,
}

impl BucketRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketRole::Static => "static",
            BucketRole::Html => "html",
            BucketRole::Runtime => "runtime",
        }
    }
}

impl fmt::Display for BucketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a bucket in the store: `"{role}-{version}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketName(String);

impl BucketName {
    pub fn new(role: BucketRole, version: &VersionTag) -> Self {
        Self(format!("{}-{}", role.as_str(), version.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three live bucket names of one deployment version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSet {
    version: VersionTag,
    static_assets: BucketName,
    html: BucketName,
    runtime: BucketName,
}

impl BucketSet {
    pub fn for_version(version: &VersionTag) -> Self {
        Self {
            version: version.clone(),
            static_assets: BucketName::new(BucketRole::Static, version),
            html: BucketName::new(BucketRole::Html, version),
            runtime: BucketName::new(BucketRole::Runtime, version),
        }
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    pub fn get(&self, role: BucketRole) -> &BucketName {
        match role {
            BucketRole::Static => &self.static_assets,
            BucketRole::Html => &self.html,
            BucketRole::Runtime => &self.runtime,
        }
    }

    pub fn names(&self) -> [&BucketName; 3] {
        [&self.static_assets, &self.html, &self.runtime]
    }

    /// True if `name` is one of this version's buckets.
    pub fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|b| b.as_str() == name)
    }
}

/// Persistent store of named buckets.
///
/// Each individual `get`/`put` is atomic for its key; concurrent writers to
/// the same key resolve as last-writer-wins. Buckets are created by `open`
/// or the first `put`; reads never create them.
#[async_trait::async_trait]
pub trait BucketStore: Send + Sync {
    /// Create the bucket if it does not exist yet.
    async fn open(&self, bucket: &BucketName) -> Result<(), Error>;

    /// Look up a stored response. A missing bucket is a miss.
    async fn get(&self, bucket: &BucketName, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Insert or overwrite the response stored for `key`.
    async fn put(&self, bucket: &BucketName, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Store a batch of entries atomically, creating the bucket if needed.
    ///
    /// On error nothing from the batch is visible and a bucket that did not
    /// exist before is not created.
    async fn put_all(&self, bucket: &BucketName, entries: &[(RequestKey, Response)]) -> Result<(), Error>;

    /// Names of every existing bucket, sorted.
    async fn list_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a whole bucket. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Number of entries in the named bucket (0 for a missing bucket).
    async fn count(&self, name: &str) -> Result<usize, Error>;
}
