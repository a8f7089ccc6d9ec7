//! # swkit Net
//!
//! Request and response model plus network fetching for the swkit offline
//! cache.
//!
//! ## Design Goals
//!
//! 1. **Browser semantics**: request modes, cache modes and response types
//!    follow the Fetch standard closely enough for cache decisions
//! 2. **Pluggable network**: the worker only sees the [`Fetcher`] trait
//! 3. **Replayable responses**: bodies are fully buffered so a response can
//!    be handed to a caller and stored at the same time

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use swkit_common::SwKitError;
use thiserror::Error;
use url::Url;

pub mod loader;
pub mod origin;

pub use loader::{HttpFetcher, LoaderConfig};
pub use origin::{is_cross_origin, is_same_origin};

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<NetError> for SwKitError {
    fn from(err: NetError) -> Self {
        SwKitError::network_with_source("fetch failed", err)
    }
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Request mode, as seen by a fetch interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load (link click, reload, address bar).
    Navigate,
    /// Only same-origin targets are allowed.
    SameOrigin,
    /// Cross-origin allowed, response becomes opaque.
    #[default]
    NoCors,
    /// Cross-origin allowed with CORS checks.
    Cors,
}

/// HTTP cache mode of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Let intermediate HTTP caches answer.
    #[default]
    Default,
    /// Force revalidation with the origin server.
    Reload,
    /// Bypass HTTP caches entirely and do not store.
    NoStore,
}

/// Outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
    pub cache: CacheMode,
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            mode: RequestMode::NoCors,
            cache: CacheMode::Default,
            timeout: None,
        }
    }

    /// Create a navigation (document) request.
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    /// Create a POST request.
    pub fn post(url: Url, body: Bytes) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            mode: RequestMode::Cors,
            ..Self::get(url)
        }
    }

    /// Parse a URL and create a GET request for it.
    pub fn parse(url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|e| NetError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::get(url))
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the request mode.
    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the cache mode.
    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Whether this is a full-page load.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// Response type, mirroring `Response.type` in the Fetch standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response that passed CORS.
    Cors,
    /// Synthesized locally.
    Default,
    /// Network error.
    Error,
    /// Cross-origin no-cors response; status and headers are hidden.
    Opaque,
}

/// HTTP response with a fully buffered body.
///
/// Cloning is cheap: the body is reference counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub url: Option<Url>,
    /// Status code. Opaque and error responses report 0.
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub response_type: ResponseType,
}

impl Response {
    /// Create a basic response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: None,
            status,
            status_text: http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            headers: HeaderMap::new(),
            body: body.into(),
            response_type: ResponseType::Basic,
        }
    }

    /// Create a network error response.
    pub fn error() -> Self {
        Self {
            url: None,
            status: 0,
            status_text: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            response_type: ResponseType::Error,
        }
    }

    /// Create an opaque response. The body is kept so it can be replayed.
    pub fn opaque(url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            url: Some(url),
            status: 0,
            status_text: String::new(),
            headers: HeaderMap::new(),
            body: body.into(),
            response_type: ResponseType::Opaque,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the final URL.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Set the response type.
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Check if request was successful (2xx).
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.response_type == ResponseType::Opaque
    }

    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

/// Network access as seen by the cache worker.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a request. `Err` means the request never produced a response
    /// (offline, DNS failure, refused connection).
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}
