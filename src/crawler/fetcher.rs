//! Network access for both stages
//!
//! Covers:
//! - The identifying user agent and client timeouts
//! - GET requests for pages, reporting non-HTML responses as mismatches
//! - HEAD probes that sniff the content type of a link
//! - Raw byte downloads for assets
//! - Serving and storing responses through the optional SQLite cache
//!
//! The crawl and the downloader only see the [`Fetcher`] trait.

use crate::cache::{CacheMethod, CachedResponse, ResponseCache};
use crate::config::UserAgentConfig;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, Response, StatusCode};
use std::sync::Mutex;
use std::time::Duration;

/// Outcome of fetching one page
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// URL the redirects ended at
        final_url: String,
        status_code: u16,
        content_type: String,
        body: String,
    },

    /// Page is not HTML (Content-Type mismatch); the body was not read
    ContentMismatch {
        /// Content type the server declared
        content_type: String,
        final_url: String,
    },

    /// Any status outside 2xx
    HttpError { status_code: u16 },

    /// The request never produced a response (DNS, refused connection, timeout)
    NetworkError { error: String },
}

/// Result of a content-type probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Reachable {
        final_url: String,
        content_type: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl ProbeResult {
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Reachable { content_type, .. } => content_type.as_deref(),
            Self::Failed { .. } => None,
        }
    }

    /// True when the link leads to an HTML page (a wrapper rather than a file)
    pub fn is_html(&self) -> bool {
        self.content_type().map(is_html).unwrap_or(false)
    }
}

/// Returns true for HTML content types
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type.to_ascii_lowercase();
    mime.contains("text/html") || mime.contains("application/xhtml")
}

/// Fetch capability consumed by the crawler and the downloader
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches an HTML page
    async fn get(&self, url: &str) -> FetchResult;

    /// Sniffs the content type of `url` without downloading it
    async fn probe(&self, url: &str) -> ProbeResult;

    /// Downloads raw bytes (assets, media)
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Builds the shared reqwest client
///
/// Requests identify the harvester as `Name/Version (+contact-url; contact-email)`,
/// follow at most 10 redirects and give up after `timeout_secs`.
///
/// # Example
///
/// ```no_run
/// use tessa_harvest::config::UserAgentConfig;
/// use tessa_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "TessaHarvest".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.org/about".to_string(),
///     contact_email: "ops@example.org".to_string(),
/// };
///
/// let client = build_http_client(&config, 30).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout_secs: u64) -> std::result::Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `Fetcher` backed by reqwest and the optional response cache
pub struct HttpFetcher {
    client: Client,
    cache: Option<Mutex<ResponseCache>>,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client, cache: None }
    }

    /// Serves and stores responses through `cache`
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    fn cache_get(&self, method: CacheMethod, url: &str) -> Option<CachedResponse> {
        let cache = self.cache.as_ref()?;
        let mut guard = match cache.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!("Response cache lock poisoned, bypassing cache");
                return None;
            }
        };
        match guard.get(method, url) {
            Ok(hit) => {
                if hit.is_some() {
                    tracing::debug!("Cache hit: {} {}", method.as_str(), url);
                }
                hit
            }
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", url, e);
                None
            }
        }
    }

    fn cache_put(&self, method: CacheMethod, response: CachedResponse) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match cache.lock() {
            Ok(mut guard) => {
                if let Err(e) = guard.put(method, &response) {
                    tracing::warn!("Cache write failed for {}: {}", response.url, e);
                }
            }
            Err(_) => tracing::warn!("Response cache lock poisoned, not caching {}", response.url),
        }
    }

    fn remember_head(&self, url: &str, final_url: &str, status: u16, content_type: Option<String>) {
        self.cache_put(
            CacheMethod::Head,
            CachedResponse {
                url: url.to_string(),
                final_url: final_url.to_string(),
                status,
                content_type,
                body: Vec::new(),
                fetched_at: Utc::now(),
            },
        );
    }
}

fn header_content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn network_error(e: &reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else {
        e.to_string()
    };
    FetchResult::NetworkError { error }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetches a page
    ///
    /// # Request Flow
    ///
    /// 1. Serve a cached GET, or a cached HEAD that is known not to be HTML
    /// 2. Send GET request (redirects followed by the client)
    /// 3. Non-2xx → HttpError; non-HTML → ContentMismatch without reading the body
    /// 4. Read and cache the body
    async fn get(&self, url: &str) -> FetchResult {
        if let Some(hit) = self.cache_get(CacheMethod::Get, url) {
            let content_type = hit.content_type.unwrap_or_default();
            if !is_html(&content_type) {
                return FetchResult::ContentMismatch {
                    content_type,
                    final_url: hit.final_url,
                };
            }
            return FetchResult::Success {
                final_url: hit.final_url,
                status_code: hit.status,
                content_type,
                body: String::from_utf8_lossy(&hit.body).into_owned(),
            };
        }
        if let Some(hit) = self.cache_get(CacheMethod::Head, url) {
            let content_type = hit.content_type.unwrap_or_default();
            if !is_html(&content_type) {
                return FetchResult::ContentMismatch {
                    content_type,
                    final_url: hit.final_url,
                };
            }
        }

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return network_error(&e),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::HttpError {
                status_code: status.as_u16(),
            };
        }

        let final_url = response.url().to_string();
        let content_type = header_content_type(&response).unwrap_or_default();
        if !is_html(&content_type) {
            self.remember_head(url, &final_url, status.as_u16(), Some(content_type.clone()));
            return FetchResult::ContentMismatch {
                content_type,
                final_url,
            };
        }

        match response.text().await {
            Ok(body) => {
                self.cache_put(
                    CacheMethod::Get,
                    CachedResponse {
                        url: url.to_string(),
                        final_url: final_url.clone(),
                        status: status.as_u16(),
                        content_type: Some(content_type.clone()),
                        body: body.as_bytes().to_vec(),
                        fetched_at: Utc::now(),
                    },
                );
                FetchResult::Success {
                    final_url,
                    status_code: status.as_u16(),
                    content_type,
                    body,
                }
            }
            Err(e) => network_error(&e),
        }
    }

    /// Sends a HEAD request to check Content-Type
    ///
    /// Servers that refuse HEAD (405) are asked with a GET whose body is never read.
    async fn probe(&self, url: &str) -> ProbeResult {
        for method in [CacheMethod::Head, CacheMethod::Get] {
            if let Some(hit) = self.cache_get(method, url) {
                return ProbeResult::Reachable {
                    final_url: hit.final_url,
                    content_type: hit.content_type,
                };
            }
        }

        let mut response = self.client.head(url).send().await;
        if matches!(&response, Ok(r) if r.status() == StatusCode::METHOD_NOT_ALLOWED) {
            response = self.client.get(url).send().await;
        }

        match response {
            Ok(response) if response.status().is_success() => {
                let final_url = response.url().to_string();
                let content_type = header_content_type(&response);
                self.remember_head(url, &final_url, response.status().as_u16(), content_type.clone());
                ProbeResult::Reachable {
                    final_url,
                    content_type,
                }
            }
            Ok(response) => ProbeResult::Failed {
                error: format!("HTTP {}", response.status().as_u16()),
            },
            Err(e) => ProbeResult::Failed { error: e.to_string() },
        }
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(hit) = self.cache_get(CacheMethod::Get, url) {
            return Ok(hit.body);
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                HarvestError::Timeout { url: url.to_string() }
            } else {
                HarvestError::Http {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = header_content_type(&response);
        let bytes = response.bytes().await.map_err(|e| HarvestError::Http {
            url: url.to_string(),
            source: e,
        })?;

        self.cache_put(
            CacheMethod::Get,
            CachedResponse {
                url: url.to_string(),
                final_url,
                status: status.as_u16(),
                content_type,
                body: bytes.to_vec(),
                fetched_at: Utc::now(),
            },
        );

        Ok(bytes.to_vec())
    }
}

/// In-memory `Fetcher` serving canned responses
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone)]
    struct Canned {
        content_type: String,
        body: Vec<u8>,
    }

    #[derive(Default)]
    pub(crate) struct StaticFetcher {
        pages: HashMap<String, Canned>,
        requests: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn html(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Canned {
                    content_type: "text/html; charset=utf-8".to_string(),
                    body: body.as_bytes().to_vec(),
                },
            );
            self
        }

        pub(crate) fn file(mut self, url: &str, content_type: &str, body: &[u8]) -> Self {
            self.pages.insert(
                url.to_string(),
                Canned {
                    content_type: content_type.to_string(),
                    body: body.to_vec(),
                },
            );
            self
        }

        /// URLs requested so far, in order
        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        fn lookup(&self, url: &str) -> Option<Canned> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            self.pages.get(url).cloned()
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn get(&self, url: &str) -> FetchResult {
            match self.lookup(url) {
                Some(page) if is_html(&page.content_type) => FetchResult::Success {
                    final_url: url.to_string(),
                    status_code: 200,
                    content_type: page.content_type,
                    body: String::from_utf8_lossy(&page.body).into_owned(),
                },
                Some(page) => FetchResult::ContentMismatch {
                    content_type: page.content_type,
                    final_url: url.to_string(),
                },
                None => FetchResult::HttpError { status_code: 404 },
            }
        }

        async fn probe(&self, url: &str) -> ProbeResult {
            match self.lookup(url) {
                Some(page) => ProbeResult::Reachable {
                    final_url: url.to_string(),
                    content_type: Some(page.content_type),
                },
                None => ProbeResult::Failed {
                    error: "HTTP 404".to_string(),
                },
            }
        }

        async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.lookup(url)
                .map(|page| page.body)
                .ok_or_else(|| HarvestError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }
}
