//! Worker bootstrap from configuration.

use std::sync::Arc;

use swcache_core::{AppConfig, Engine, SqliteBucketStore, Worker};

use crate::error::ClientError;
use crate::fetch::{FetchConfig, HttpFetcher};

/// Build a worker over the SQLite store at `config.db_path` and a reqwest fetcher.
///
/// The worker starts in the `Parsed` state; the host drives `install` and
/// `activate` itself.
pub async fn open_worker(config: &AppConfig) -> Result<Worker, ClientError> {
    let settings = config.settings()?;
    let store = SqliteBucketStore::open(&config.db_path).await?;
    let fetcher = HttpFetcher::new(FetchConfig::from(config))?;

    tracing::info!(
        version = %settings.version,
        db = %config.db_path.display(),
        "opened bucket store"
    );

    Ok(Worker::new(Engine::new(Arc::new(store), Arc::new(fetcher), settings)))
}
