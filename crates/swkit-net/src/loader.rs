//! reqwest-backed [`Fetcher`].

use std::time::Duration;

use async_trait::async_trait;
use http::{header, HeaderValue};
use reqwest::Client;
use tracing::{debug, info, trace};
use url::Url;

use crate::{is_same_origin, CacheMode, Fetcher, NetError, Request, RequestMode, Response, ResponseType};

/// Network loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
    /// Origin of the application the worker serves. Responses from other
    /// origins to `no-cors` requests are reported as opaque.
    pub app_origin: Option<Url>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("swkit/{}", env!("CARGO_PKG_VERSION")),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
            app_origin: None,
        }
    }
}

/// Fetches requests over HTTP(S).
pub struct HttpFetcher {
    client: Client,
    config: LoaderConfig,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(origin = ?config.app_origin.as_ref().map(Url::as_str), "HttpFetcher initialized");

        Ok(Self { client, config })
    }

    fn classify(&self, request: &Request, final_url: &Url) -> ResponseType {
        match &self.config.app_origin {
            Some(origin) if !is_same_origin(final_url, origin) => {
                if request.mode == RequestMode::NoCors {
                    ResponseType::Opaque
                } else {
                    ResponseType::Cors
                }
            }
            _ => ResponseType::Basic,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(
            request_id = request.id.raw(),
            url = %request.url,
            method = %request.method,
            cache = ?request.cache,
            "Fetching resource"
        );

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        // Ask intermediaries to revalidate.
        if matches!(request.cache, CacheMode::Reload | CacheMode::NoStore) {
            let directive = if request.cache == CacheMode::Reload {
                "no-cache"
            } else {
                "no-store"
            };
            req_builder = req_builder
                .header(header::CACHE_CONTROL, HeaderValue::from_static(directive))
                .header(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }

        if let Some(body) = request.body.clone() {
            req_builder = req_builder.body(body);
        }

        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        req_builder = req_builder.timeout(timeout);

        let to_net_error = |e: reqwest::Error| {
            if e.is_timeout() {
                NetError::Timeout(timeout)
            } else {
                NetError::HttpError(e)
            }
        };

        let response = req_builder.send().await.map_err(to_net_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(to_net_error)?;
        let response_type = self.classify(&request, &url);

        trace!(
            url = %url,
            status = %status,
            response_type = ?response_type,
            body_len = body.len(),
            "Response received"
        );

        if response_type == ResponseType::Opaque {
            return Ok(Response::opaque(url, body));
        }

        Ok(Response {
            url: Some(url),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            response_type,
        })
    }
}
