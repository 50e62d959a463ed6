//! In-memory bucket store.
//!
//! Uses a HashMap of buckets behind a tokio RwLock. Nothing survives the
//! process; meant for tests and hosts that do not need persistence.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BucketName, BucketStore};
use crate::Error;
use crate::request::{RequestKey, Response};

type Bucket = HashMap<String, Response>;

#[derive(Clone, Debug, Default)]
pub struct MemoryBucketStore {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BucketStore for MemoryBucketStore {
    async fn open(&self, bucket: &BucketName) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket.as_str().to_string()).or_default();
        Ok(())
    }

    async fn get(&self, bucket: &BucketName, key: &RequestKey) -> Result<Option<Response>, Error> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket.as_str())
            .and_then(|entries| entries.get(&key.hash))
            .cloned())
    }

    async fn put(&self, bucket: &BucketName, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.as_str().to_string())
            .or_default()
            .insert(key.hash.clone(), response.clone());
        Ok(())
    }

    async fn put_all(&self, bucket: &BucketName, entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        let mut buckets = self.buckets.write().await;
        let target = buckets.entry(bucket.as_str().to_string()).or_default();
        for (key, response) in entries {
            target.insert(key.hash.clone(), response.clone());
        }
        Ok(())
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        let buckets = self.buckets.read().await;
        let mut names: Vec<String> = buckets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut buckets = self.buckets.write().await;
        Ok(buckets.remove(name).is_some())
    }

    async fn count(&self, name: &str) -> Result<usize, Error> {
        let buckets = self.buckets.read().await;
        Ok(buckets.get(name).map_or(0, HashMap::len))
    }
}
