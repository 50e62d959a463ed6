//! Request and response values exchanged between the host, the engine and the store.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use url::Url;

use crate::cache::hash::compute_request_key;
use crate::resolve::canonical;

/// Body text of the synthesized offline response.
pub const OFFLINE_BODY: &str = "Offline";

/// How the host issued the request, mirroring the fetch `mode` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: RequestMode,
    pub body: Option<Bytes>,
}

impl Request {
    /// A plain GET for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, headers: HeaderMap::new(), mode: RequestMode::default(), body: None }
    }

    /// A navigation request, as issued when the user opens a page.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn new(method: Method, url: Url) -> Self {
        Self { method, ..Self::get(url) }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// True when the `Accept` header asks for HTML.
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains("text/html"))
    }

    /// True for navigations and requests that declare HTML intent.
    pub fn is_document(&self) -> bool {
        self.mode == RequestMode::Navigate || self.accepts_html()
    }

    /// Identity of this request inside a bucket.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.clone(), &self.url)
    }
}

/// Bucket key for a request: method plus canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
    pub hash: String,
}

impl RequestKey {
    pub fn new(method: Method, url: &Url) -> Self {
        let url = canonical(url).to_string();
        let hash = compute_request_key(method.as_str(), &url);
        Self { method, url, hash }
    }
}

/// A response snapshot, either fresh from the network or read back from a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    /// The response handed out when neither network nor buckets can serve.
    pub fn offline() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        Self { status: StatusCode::SERVICE_UNAVAILABLE, headers, body: Bytes::from_static(OFFLINE_BODY.as_bytes()) }
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}
