//! Fetch/serve strategy engine.
//!
//! Every intercepted request is classified and then served by exactly one
//! strategy:
//!
//! ### Passthrough
//! - Straight to the network; failures propagate unmodified.
//!
//! ### HTML documents (network-first)
//! - Network bypassing intermediate caches, copy stored in the html bucket.
//! - Offline: html bucket → offline page from the static bucket → synthesized 503.
//!
//! ### Local assets (stale-while-revalidate)
//! - Cached copy from the runtime bucket returned immediately.
//! - A detached revalidation refreshes the runtime bucket in the background.
//!
//! ### Remote assets (network-first with cache store)
//! - Network, ok responses stored in the runtime bucket; runtime bucket on failure.
//!
//! Only passthrough ever surfaces a failure. Every other path ends in a
//! response, at worst the synthesized offline one.

mod strategy;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::cache::{BucketRole, BucketSet, BucketStore};
use crate::classify::{RequestCategory, classify};
use crate::config::Settings;
use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::request::{Request, RequestKey, Response};

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Network,
    Bucket(BucketRole),
    /// The precached offline page from the static bucket.
    OfflinePage,
    /// The synthesized 503 response.
    Synthesized,
}

/// A response handed back to the host, with its provenance.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: Source,
    pub category: RequestCategory,
}

/// Request classification and strategy execution against one bucket set.
///
/// The store and fetcher are injected; nothing is shared through globals, so
/// independent engines can run side by side.
pub struct Engine {
    store: Arc<dyn BucketStore>,
    fetcher: Arc<dyn Fetcher>,
    settings: Settings,
    buckets: BucketSet,
    offline_key: RequestKey,
    revalidations: Mutex<JoinSet<()>>,
}

impl Engine {
    pub fn new(store: Arc<dyn BucketStore>, fetcher: Arc<dyn Fetcher>, settings: Settings) -> Self {
        let buckets = BucketSet::for_version(&settings.version);
        let offline_key = Request::get(settings.offline_page.clone()).key();
        Self { store, fetcher, settings, buckets, offline_key, revalidations: Mutex::new(JoinSet::new()) }
    }

    pub fn classify(&self, request: &Request) -> RequestCategory {
        classify(request, &self.settings.policy)
    }

    /// Serve one intercepted request.
    ///
    /// # Errors
    ///
    /// Only passthrough requests return an error: the fetcher's own failure,
    /// unmodified.
    pub async fn handle(&self, request: &Request) -> Result<Served, FetchError> {
        let category = self.classify(request);
        tracing::debug!(method = %request.method, url = %request.url, %category, "routing request");

        let (response, source) = match category {
            RequestCategory::Passthrough => self.passthrough(request).await?,
            RequestCategory::HtmlDocument => self.network_first_html(request).await,
            RequestCategory::LocalAsset => self.stale_while_revalidate(request).await,
            RequestCategory::GenericRemote => self.network_first_remote(request).await,
        };

        Ok(Served { response, source, category })
    }

    /// Wait for every background revalidation spawned so far.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.revalidations.lock().await);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                tracing::warn!("revalidation task panicked: {e}");
            }
        }
    }

    /// Cancel outstanding background revalidations.
    pub async fn abort_revalidations(&self) {
        self.revalidations.lock().await.abort_all();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn buckets(&self) -> &BucketSet {
        &self.buckets
    }

    pub fn store(&self) -> &Arc<dyn BucketStore> {
        &self.store
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }
}
