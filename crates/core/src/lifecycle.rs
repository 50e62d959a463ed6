//! Install/activate lifecycle of one deployment version.
//!
//! A `Worker` owns an `Engine` and gates it behind two steps:
//!
//! 1. **install**: fetch the whole precache manifest and store it in the
//!    static bucket. All-or-nothing: one failed entry fails the install and
//!    nothing is written.
//! 2. **activate**: delete every bucket that does not belong to the current
//!    version, then start serving.
//!
//! Requests are only served once activation has completed.

use std::fmt;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tokio::sync::RwLock;

use crate::cache::BucketRole;
use crate::engine::{Engine, Served};
use crate::error::Error;
use crate::fetch::CacheMode;
use crate::request::Request;

/// Lifecycle states of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, nothing run yet.
    Parsed,
    Installing,
    /// Precache populated, waiting for activation.
    Installed,
    Activating,
    /// Serving requests.
    Activated,
    /// Install failed; may be retried.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Entry count of one bucket in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    pub entries: usize,
    /// Whether the bucket belongs to this worker's version.
    pub current: bool,
}

pub struct Worker {
    engine: Arc<Engine>,
    state: RwLock<WorkerState>,
}

impl Worker {
    pub fn new(engine: Engine) -> Self {
        Self { engine: Arc::new(engine), state: RwLock::new(WorkerState::Parsed) }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Populate the static bucket from the precache manifest.
    ///
    /// Returns the number of manifest entries stored. Re-running overwrites
    /// the same keys, so the bucket holds one entry per manifest URL.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` while installing, activating or activated
    /// - `Error::PrecacheFailed` if any entry fails or is not 2xx; the worker
    ///   becomes `Redundant`
    /// - store errors; nothing is written and the worker becomes `Redundant`
    pub async fn install(&self) -> Result<usize, Error> {
        self.transition(
            &[WorkerState::Parsed, WorkerState::Installed, WorkerState::Redundant],
            WorkerState::Installing,
            "parsed, installed or redundant",
        )
        .await?;

        let result = self.precache().await;

        let mut state = self.state.write().await;
        match &result {
            Ok(count) => {
                tracing::info!(version = %self.engine.buckets().version(), entries = count, "install complete");
                *state = WorkerState::Installed;
            }
            Err(e) => {
                tracing::warn!(version = %self.engine.buckets().version(), error = %e, "install failed");
                *state = WorkerState::Redundant;
            }
        }
        result
    }

    /// Delete buckets of other versions, then start serving.
    ///
    /// Returns the names of the deleted buckets.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the worker is `Installed`
    /// - store errors; the worker stays `Installed` and may retry
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating, "installed")
            .await?;

        let result = self.prune().await;

        let mut state = self.state.write().await;
        match &result {
            Ok(deleted) => {
                tracing::info!(
                    version = %self.engine.buckets().version(),
                    deleted = deleted.len(),
                    "activated"
                );
                *state = WorkerState::Activated;
            }
            Err(e) => {
                tracing::warn!(error = %e, "activation failed");
                *state = WorkerState::Installed;
            }
        }
        result
    }

    /// Serve one intercepted request.
    ///
    /// # Errors
    ///
    /// - `Error::NotActivated` before activation has completed
    /// - `Error::Fetch` for failed passthrough requests
    pub async fn handle_fetch(&self, request: &Request) -> Result<Served, Error> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            return Err(Error::NotActivated(state.to_string()));
        }
        Ok(self.engine.handle(request).await?)
    }

    /// Every bucket in the store with its entry count.
    pub async fn inventory(&self) -> Result<Vec<BucketSummary>, Error> {
        let store = self.engine.store();
        let buckets = self.engine.buckets();
        let mut summaries = Vec::new();
        for name in store.list_names().await? {
            let entries = store.count(&name).await?;
            let current = buckets.contains(&name);
            summaries.push(BucketSummary { name, entries, current });
        }
        Ok(summaries)
    }

    async fn transition(&self, from: &[WorkerState], to: WorkerState, expected: &str) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !from.contains(&*state) {
            return Err(Error::InvalidState { expected: expected.into(), actual: state.to_string() });
        }
        *state = to;
        Ok(())
    }

    async fn precache(&self) -> Result<usize, Error> {
        let fetcher = self.engine.fetcher();
        let fetches = self.engine.settings().precache.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = fetcher
                .fetch(&request, CacheMode::Default)
                .await
                .map_err(|e| Error::PrecacheFailed { url: url.to_string(), reason: e.to_string() })?;
            if !response.ok() {
                return Err(Error::PrecacheFailed {
                    url: url.to_string(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }
            Ok::<_, Error>((request.key(), response))
        });
        let entries = try_join_all(fetches).await?;

        let store = self.engine.store();
        let bucket = self.engine.buckets().get(BucketRole::Static);
        store.put_all(bucket, &entries).await?;
        tracing::debug!(%bucket, entries = entries.len(), "precache stored");

        Ok(entries.len())
    }

    async fn prune(&self) -> Result<Vec<String>, Error> {
        let store = self.engine.store();
        let buckets = self.engine.buckets();

        let stale: Vec<String> = store
            .list_names()
            .await?
            .into_iter()
            .filter(|name| !buckets.contains(name))
            .collect();

        try_join_all(stale.iter().map(|name| store.delete(name))).await?;
        for name in &stale {
            tracing::info!("deleted stale bucket {name}");
        }

        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BucketName, BucketSet, BucketStore, MemoryBucketStore, SqliteBucketStore, VersionTag};
    use crate::engine::Source;
    use crate::error::FetchError;
    use crate::request::Response;
    use crate::testing::{ScriptedFetcher, reject_writes_to, settings, url};
    use http::StatusCode;

    fn worker(store: &MemoryBucketStore, fetcher: &Arc<ScriptedFetcher>, version: &str) -> Worker {
        Worker::new(Engine::new(Arc::new(store.clone()), fetcher.clone(), settings(version)))
    }

    fn manifest_online(fetcher: &ScriptedFetcher) {
        fetcher.respond(&url("/"), StatusCode::OK, "<h1>home</h1>");
        fetcher.respond(&url("/offline.html"), StatusCode::OK, "<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_install_populates_static_bucket() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        let worker = worker(&store, &fetcher, "v7");

        assert_eq!(worker.install().await.unwrap(), 2);

        assert_eq!(worker.state().await, WorkerState::Installed);
        assert_eq!(store.count("static-v7").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_install_twice_does_not_duplicate() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        let worker = worker(&store, &fetcher, "v7");

        worker.install().await.unwrap();
        worker.install().await.unwrap();

        assert_eq!(store.count("static-v7").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(&url("/"), StatusCode::OK, "<h1>home</h1>");
        fetcher.fail(&url("/offline.html"));
        let worker = worker(&store, &fetcher, "v7");

        let err = worker.install().await.unwrap_err();

        assert!(matches!(err, Error::PrecacheFailed { url: ref failed, .. } if failed.ends_with("/offline.html")));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(store.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_non_ok_entry() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        fetcher.respond(&url("/"), StatusCode::OK, "<h1>home</h1>");
        fetcher.respond(&url("/offline.html"), StatusCode::NOT_FOUND, "missing");
        let worker = worker(&store, &fetcher, "v7");

        let err = worker.install().await.unwrap_err();

        assert!(matches!(err, Error::PrecacheFailed { ref reason, .. } if reason == "status 404"));
    }

    #[tokio::test]
    async fn test_store_failure_during_install_writes_nothing() {
        let store = SqliteBucketStore::open_in_memory().await.unwrap();
        reject_writes_to(&store, "/offline.html").await;
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        let worker = Worker::new(Engine::new(Arc::new(store.clone()), fetcher.clone(), settings("v7")));

        let err = worker.install().await.unwrap_err();

        assert!(matches!(err, Error::Database(_)));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert_eq!(store.count("static-v7").await.unwrap(), 0);
        assert!(store.list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_retry_after_failure() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        fetcher.set_offline(true);
        manifest_online(&fetcher);
        let worker = worker(&store, &fetcher, "v7");

        assert!(worker.install().await.is_err());
        fetcher.set_offline(false);
        assert_eq!(worker.install().await.unwrap(), 2);
        assert_eq!(worker.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        let worker = worker(&store, &fetcher, "v7");

        let err = worker.activate().await.unwrap_err();

        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_deletes_other_versions() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);

        let old = BucketSet::for_version(&VersionTag::new("v6").unwrap());
        let key = Request::get(url("/app.js")).key();
        for name in old.names() {
            store.put(name, &key, &Response::new(StatusCode::OK, "old")).await.unwrap();
        }
        let legacy = BucketName::new(BucketRole::Static, &VersionTag::new("cache-v2").unwrap());
        store.open(&legacy).await.unwrap();

        let worker = worker(&store, &fetcher, "v7");
        worker.install().await.unwrap();
        let mut deleted = worker.activate().await.unwrap();
        deleted.sort();

        assert_eq!(deleted, vec!["html-v6", "runtime-v6", "static-cache-v2", "static-v6"]);
        assert_eq!(store.list_names().await.unwrap(), vec!["static-v7"]);
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_activation_keeps_only_current_buckets() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        for version in ["v1", "v2", "v7", "v8"] {
            let set = BucketSet::for_version(&VersionTag::new(version).unwrap());
            for name in set.names() {
                store.open(name).await.unwrap();
            }
        }

        let worker = worker(&store, &fetcher, "v7");
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let current = BucketSet::for_version(&VersionTag::new("v7").unwrap());
        let names = store.list_names().await.unwrap();
        assert!(names.iter().all(|name| current.contains(name)));
        assert_eq!(names.len(), 3);
    }

    #[tokio::test]
    async fn test_requests_rejected_before_activation() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        let worker = worker(&store, &fetcher, "v7");

        worker.install().await.unwrap();
        let err = worker.handle_fetch(&Request::navigate(url("/"))).await.unwrap_err();

        assert!(matches!(err, Error::NotActivated(ref state) if state == "installed"));
    }

    #[tokio::test]
    async fn test_offline_navigation_after_install_serves_offline_page() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        let worker = worker(&store, &fetcher, "v7");
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        fetcher.set_offline(true);
        let served = worker.handle_fetch(&Request::navigate(url("/never-visited"))).await.unwrap();

        assert_eq!(served.source, Source::OfflinePage);
        assert_eq!(&served.response.body[..], b"<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_passthrough_failure_surfaces_through_worker() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        let worker = worker(&store, &fetcher, "v7");
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let err = worker
            .handle_fetch(&Request::get(url("https://plausible.io/api/event")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_install_after_activation_rejected() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        let worker = worker(&store, &fetcher, "v7");
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        assert!(matches!(worker.install().await, Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_inventory_marks_current_buckets() {
        let store = MemoryBucketStore::new();
        let fetcher = ScriptedFetcher::new();
        manifest_online(&fetcher);
        store
            .open(&BucketName::new(BucketRole::Html, &VersionTag::new("v6").unwrap()))
            .await
            .unwrap();
        let worker = worker(&store, &fetcher, "v7");
        worker.install().await.unwrap();

        let inventory = worker.inventory().await.unwrap();

        assert_eq!(
            inventory,
            vec![
                BucketSummary { name: "html-v6".into(), entries: 0, current: false },
                BucketSummary { name: "static-v7".into(), entries: 2, current: true },
            ]
        );
    }
}
