//! reqwest-backed network fetcher.
//!
//! ### Request forwarding
//! - Method, headers and body of the intercepted request are sent as-is
//! - `CacheMode::NoStore` adds `Cache-Control: no-cache` and `Pragma: no-cache`
//!
//! ### Limits
//! - Max redirects: 5 (configurable)
//! - Max body bytes: 5MB (configurable), checked against Content-Length and
//!   while streaming the body; not applied to `CacheMode::Passthrough`
//! - Request timeout: 20s (configurable)
//!
//! HTTP error statuses come back as responses. Only transport failures and
//! exceeded limits are errors.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use reqwest::{Client, header};
use swcache_core::{AppConfig, CacheMode, FetchError, Fetcher, Request, Response};

use crate::error::ClientError;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "swcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Network access for the engine over a shared reqwest client.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn transport_error(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout.as_millis() as u64)
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }

    fn too_large(&self, len: usize) -> FetchError {
        FetchError::TooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request, cache: CacheMode) -> Result<Response, FetchError> {
        let start = Instant::now();

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if cache == CacheMode::NoStore {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let mut response = builder.send().await.map_err(|e| self.transport_error(&e))?;

        let limit = match cache {
            CacheMode::Passthrough => usize::MAX,
            CacheMode::Default | CacheMode::NoStore => self.config.max_bytes,
        };

        if let Some(len) = response.content_length()
            && len as usize > limit
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let headers = response.headers().clone();

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(&e))? {
            if body.len() + chunk.len() > limit {
                return Err(self.too_large(body.len() + chunk.len()));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response { status, headers, body: body.freeze() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, StatusCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use url::Url;

    /// Accept one connection, answer with `reply` and hand back the request head.
    async fn serve_once(reply: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&head).to_ascii_lowercase()
        });
        (Url::parse(&format!("http://{addr}/")).unwrap(), handle)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "swcache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_fetch_returns_response() {
        let (base, server) =
            serve_once("HTTP/1.1 200 OK\r\ncontent-type: text/css\r\ncontent-length: 6\r\n\r\nbody{}").await;

        let response = fetcher()
            .fetch(&Request::get(base.join("app.css").unwrap()), CacheMode::Default)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type(), Some("text/css"));
        assert_eq!(&response.body[..], b"body{}");

        let head = server.await.unwrap();
        assert!(head.starts_with("get /app.css http/1.1"));
        assert!(head.contains("user-agent: swcache/0.1"));
        assert!(!head.contains("cache-control"));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let (base, server) = serve_once("HTTP/1.1 404 Not Found\r\ncontent-length: 4\r\n\r\ngone").await;

        let response = fetcher().fetch(&Request::get(base), CacheMode::Default).await.unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.ok());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_store_bypasses_caches() {
        let (base, server) = serve_once("HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok").await;

        fetcher().fetch(&Request::navigate(base), CacheMode::NoStore).await.unwrap();

        let head = server.await.unwrap();
        assert!(head.contains("cache-control: no-cache"));
        assert!(head.contains("pragma: no-cache"));
    }

    #[tokio::test]
    async fn test_method_and_headers_forwarded() {
        let (base, server) = serve_once("HTTP/1.1 201 Created\r\ncontent-length: 0\r\n\r\n").await;
        let request = Request::new(Method::POST, base.join("api/items").unwrap())
            .with_header(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"))
            .with_body("{}");

        let response = fetcher().fetch(&request, CacheMode::Default).await.unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        let head = server.await.unwrap();
        assert!(head.starts_with("post /api/items"));
        assert!(head.contains("content-type: application/json"));
    }

    #[tokio::test]
    async fn test_declared_length_over_limit() {
        let (base, _server) = serve_once("HTTP/1.1 200 OK\r\ncontent-length: 64\r\n\r\n").await;
        let fetcher = HttpFetcher::new(FetchConfig { max_bytes: 16, ..Default::default() }).unwrap();

        let err = fetcher.fetch(&Request::get(base), CacheMode::Default).await.unwrap_err();

        assert!(matches!(err, FetchError::TooLarge(_)));
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit() {
        let (base, _server) =
            serve_once("HTTP/1.1 200 OK\r\nconnection: close\r\n\r\nthis body has no declared length").await;
        let fetcher = HttpFetcher::new(FetchConfig { max_bytes: 8, ..Default::default() }).unwrap();

        let err = fetcher.fetch(&Request::get(base), CacheMode::Default).await.unwrap_err();

        assert!(matches!(err, FetchError::TooLarge(_)));
    }

    #[tokio::test]
    async fn test_passthrough_ignores_byte_limit() {
        let (base, _server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 64\r\n\r\n\
             0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        )
        .await;
        let fetcher = HttpFetcher::new(FetchConfig { max_bytes: 16, ..Default::default() }).unwrap();
        let request = Request::new(Method::POST, base.join("upload").unwrap()).with_body("payload");

        let response = fetcher.fetch(&request, CacheMode::Passthrough).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.len(), 64);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let err = fetcher().fetch(&Request::get(url), CacheMode::Default).await.unwrap_err();

        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let fetcher =
            HttpFetcher::new(FetchConfig { timeout: Duration::from_millis(100), ..Default::default() }).unwrap();

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let err = fetcher.fetch(&Request::get(url), CacheMode::Default).await.unwrap_err();

        assert_eq!(err, FetchError::Timeout(100));
    }
}
