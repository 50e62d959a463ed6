//! Test doubles for the fetch and store ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use http::StatusCode;
use tokio::sync::Notify;
use url::Url;

use crate::cache::{BucketName, BucketStore, SqliteBucketStore};
use crate::config::{AppConfig, Settings};
use crate::error::{Error, FetchError};
use crate::fetch::{CacheMode, Fetcher};
use crate::request::{Request, RequestKey, Response};

pub(crate) const BASE: &str = "https://app.example.com";

pub(crate) fn url(path: &str) -> Url {
    Url::parse(BASE).unwrap().join(path).unwrap()
}

/// Settings for version `v7` with a two-entry manifest and plausible.io denied.
pub(crate) fn settings(version: &str) -> Settings {
    AppConfig {
        version_tag: version.into(),
        base_origin: BASE.into(),
        precache: vec!["/".into(), "/offline.html".into()],
        deny_prefixes: vec!["https://plausible.io".into()],
        ..Default::default()
    }
    .settings()
    .unwrap()
}

#[derive(Clone)]
enum Route {
    Respond(Response),
    Fail(FetchError),
    Gated(Arc<Notify>, Response),
}

/// Fetcher answering from a fixed route table.
///
/// Unknown URLs fail with a network error, as does everything while offline.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<(String, CacheMode)>>,
    offline: AtomicBool,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, url: &Url, status: StatusCode, body: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Respond(Response::new(status, body)));
    }

    pub(crate) fn fail(&self, url: &Url) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Fail(FetchError::Network("connection refused".into())));
    }

    /// The response for `url` is held back until the returned gate is notified.
    pub(crate) fn gate(&self, url: &Url, body: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Gated(gate.clone(), Response::new(StatusCode::OK, body)));
        gate
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<(String, CacheMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request, cache: CacheMode) -> Result<Response, FetchError> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push((url.clone(), cache));

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".into()));
        }

        let route = self.routes.lock().unwrap().get(&url).cloned();
        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(err)) => Err(err),
            Some(Route::Gated(gate, response)) => {
                gate.notified().await;
                Ok(response)
            }
            None => Err(FetchError::Network(format!("no route for {url}"))),
        }
    }
}

/// Store whose every operation fails.
pub(crate) struct BrokenStore;

fn broken() -> Error {
    Error::Codec("store unavailable".into())
}

#[async_trait::async_trait]
impl BucketStore for BrokenStore {
    async fn open(&self, _bucket: &BucketName) -> Result<(), Error> {
        Err(broken())
    }

    async fn get(&self, _bucket: &BucketName, _key: &RequestKey) -> Result<Option<Response>, Error> {
        Err(broken())
    }

    async fn put(&self, _bucket: &BucketName, _key: &RequestKey, _response: &Response) -> Result<(), Error> {
        Err(broken())
    }

    async fn put_all(&self, _bucket: &BucketName, _entries: &[(RequestKey, Response)]) -> Result<(), Error> {
        Err(broken())
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        Err(broken())
    }

    async fn delete(&self, _name: &str) -> Result<bool, Error> {
        Err(broken())
    }

    async fn count(&self, _name: &str) -> Result<usize, Error> {
        Err(broken())
    }
}

/// Make every insert of an entry whose URL ends with `suffix` fail.
pub(crate) async fn reject_writes_to(store: &SqliteBucketStore, suffix: &str) {
    let sql = format!(
        "CREATE TRIGGER reject_entry BEFORE INSERT ON entries WHEN NEW.url LIKE '%{suffix}'
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;"
    );
    store.conn.call(move |conn| conn.execute_batch(&sql)).await.unwrap();
}
