//! HTTP fetcher with rate limiting and charset detection
//!
//! Features:
//! - Rate limiting with governor
//! - Redirect following, reporting the final URL
//! - Charset detection from the Content-Type header or `<meta charset>`
//!
//! A request is made exactly once: non-success statuses and transport
//! errors surface immediately.

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
    Client, Response,
};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

use super::{Fetcher, Page};
use crate::config::FetcherConfig;
use crate::utils::error::FetchError;

lazy_static! {
    static ref META_CHARSET: Regex =
        Regex::new(r#"(?i)<meta[^>]+charset=["']?([a-zA-Z0-9_-]+)"#).expect("valid charset regex");
}

/// Plain HTTP fetcher
pub struct HttpFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpFetcher {
    /// Create a new fetcher with default settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(&FetcherConfig {
            rate_limit: requests_per_second,
            ..Default::default()
        })
    }

    /// Create a new fetcher from the fetcher configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(Self::default_headers())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.8,*/*;q=0.7",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers
    }

    fn check_status(url: &str, response: &Response) -> Result<(), FetchError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn map_transport(url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else {
            FetchError::Http(e)
        }
    }

    /// Decode bytes to a UTF-8 string
    ///
    /// Strategies, in order:
    /// 1. charset of the Content-Type header
    /// 2. `<meta charset>` in the first kilobyte
    /// 3. UTF-8
    pub fn decode_bytes(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
        let from_header = content_type
            .to_ascii_lowercase()
            .split(';')
            .filter_map(|part| part.trim().strip_prefix("charset=").map(str::to_string))
            .next();

        let from_meta = || {
            let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).into_owned();
            META_CHARSET
                .captures(&head)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let label = from_header.or_else(from_meta);
        let encoding = label
            .as_deref()
            .and_then(|l| Encoding::for_label(l.trim_matches('"').as_bytes()))
            .unwrap_or(UTF_8);

        let (cow, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            tracing::warn!(encoding = used.name(), "Replaced undecodable bytes");
        }
        if cow.is_empty() && !bytes.is_empty() {
            return Err(FetchError::Decode(format!(
                "Failed to decode content as {}",
                used.name()
            )));
        }

        Ok(cow.into_owned())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        self.rate_limiter.until_ready().await;
        tracing::debug!(url = %url, "Fetching URL");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_transport(url, e))?;
        Self::check_status(url, &response)?;

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::map_transport(url, e))?;
        let body = Self::decode_bytes(&bytes, &content_type)?;

        if final_url != url {
            tracing::debug!(url = %url, final_url = %final_url, "Followed redirect");
        }
        Ok(Page::new(final_url, body))
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        self.rate_limiter.until_ready().await;
        tracing::debug!(url = %url, "Posting JSON request");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_transport(url, e))?;
        Self::check_status(url, &response)?;

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(format!("Invalid JSON from {url}: {e}")))
    }
}
