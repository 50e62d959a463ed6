//! The four fetch/serve strategies.

use tokio::sync::oneshot;

use super::{Engine, Source};
use crate::cache::BucketRole;
use crate::error::FetchError;
use crate::fetch::CacheMode;
use crate::request::{Request, RequestKey, Response};

type Outcome = (Response, Source);

impl Engine {
    pub(super) async fn passthrough(&self, request: &Request) -> Result<Outcome, FetchError> {
        let response = self.fetcher.fetch(request, CacheMode::Passthrough).await?;
        Ok((response, Source::Network))
    }

    pub(super) async fn network_first_html(&self, request: &Request) -> Outcome {
        let key = request.key();

        match self.fetcher.fetch(request, CacheMode::NoStore).await {
            Ok(response) => {
                self.store_copy(BucketRole::Html, &key, &response).await;
                (response, Source::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "document fetch failed, falling back");
                if let Some(cached) = self.lookup(BucketRole::Html, &key).await {
                    (cached, Source::Bucket(BucketRole::Html))
                } else if let Some(page) = self.lookup(BucketRole::Static, &self.offline_key).await {
                    (page, Source::OfflinePage)
                } else {
                    (Response::offline(), Source::Synthesized)
                }
            }
        }
    }

    pub(super) async fn stale_while_revalidate(&self, request: &Request) -> Outcome {
        let key = request.key();
        let cached = self.lookup(BucketRole::Runtime, &key).await;
        let fresh = self.spawn_revalidation(request.clone(), key).await;

        if let Some(cached) = cached {
            tracing::debug!(url = %request.url, "serving stale asset, revalidating in background");
            return (cached, Source::Bucket(BucketRole::Runtime));
        }

        match fresh.await {
            Ok(Ok(response)) => (response, Source::Network),
            Ok(Err(e)) => {
                tracing::debug!(url = %request.url, error = %e, "asset fetch failed with nothing cached");
                (Response::offline(), Source::Synthesized)
            }
            Err(_) => (Response::offline(), Source::Synthesized),
        }
    }

    pub(super) async fn network_first_remote(&self, request: &Request) -> Outcome {
        let key = request.key();

        match self.fetcher.fetch(request, CacheMode::Default).await {
            Ok(response) => {
                if response.ok() {
                    self.store_copy(BucketRole::Runtime, &key, &response).await;
                }
                (response, Source::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "remote fetch failed, trying runtime bucket");
                match self.lookup(BucketRole::Runtime, &key).await {
                    Some(cached) => (cached, Source::Bucket(BucketRole::Runtime)),
                    None => (Response::offline(), Source::Synthesized),
                }
            }
        }
    }

    /// Spawn the background fetch of stale-while-revalidate.
    ///
    /// The task stores ok responses in the runtime bucket before reporting
    /// the result. Callers that already answered drop the receiver; the
    /// task's failure is then only visible as a bucket that was not updated.
    async fn spawn_revalidation(
        &self, request: Request, key: RequestKey,
    ) -> oneshot::Receiver<Result<Response, FetchError>> {
        let (tx, rx) = oneshot::channel();
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        let bucket = self.buckets.get(BucketRole::Runtime).clone();

        let mut tasks = self.revalidations.lock().await;
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let result = fetcher.fetch(&request, CacheMode::Default).await;
            match &result {
                Ok(response) if response.ok() => {
                    if let Err(e) = store.put(&bucket, &key, response).await {
                        tracing::warn!(url = %request.url, error = %e, "failed to store revalidated asset");
                    }
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status.as_u16(), "not storing non-ok asset");
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "revalidation failed, bucket left as is");
                }
            }
            let _ = tx.send(result);
        });

        rx
    }

    /// Bucket read that treats store failures as a miss.
    async fn lookup(&self, role: BucketRole, key: &RequestKey) -> Option<Response> {
        let bucket = self.buckets.get(role);
        match self.store.get(bucket, key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%bucket, url = %key.url, error = %e, "bucket read failed, treating as miss");
                None
            }
        }
    }

    /// Bucket write whose failure never reaches the caller.
    async fn store_copy(&self, role: BucketRole, key: &RequestKey, response: &Response) {
        let bucket = self.buckets.get(role);
        if let Err(e) = self.store.put(bucket, key, response).await {
            tracing::warn!(%bucket, url = %key.url, error = %e, "bucket write failed");
        }
    }
}
