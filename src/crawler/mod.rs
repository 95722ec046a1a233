//! Page fetching for the site crawlers
//!
//! Adapters talk to a [`Fetcher`]: a plain HTTP implementation, a
//! scripted-browser one (feature `browser`), and a caching wrapper that can
//! sit in front of either. Fetches are awaited one at a time by the crawl.

#[cfg(feature = "browser")]
pub mod browser;
pub mod fetcher;
pub mod url;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use fetcher::HttpFetcher;
pub use url::resolve_url;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{CachedPage, PageCache};
use crate::utils::error::FetchError;

/// A fetched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL after redirects
    pub url: String,
    /// Decoded body (HTML markup or JSON text)
    pub body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

/// Retrieves pages by absolute URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET a page, following redirects
    async fn get(&self, url: &str) -> Result<Page, FetchError>;

    /// POST a JSON body and decode the JSON response
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError>;

    /// Forget anything remembered about `url`
    async fn evict(&self, _url: &str) -> Result<(), FetchError> {
        Ok(())
    }
}

#[async_trait]
impl Fetcher for Box<dyn Fetcher> {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        (**self).get(url).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        (**self).post_json(url, body).await
    }

    async fn evict(&self, url: &str) -> Result<(), FetchError> {
        (**self).evict(url).await
    }
}

/// Read-through / write-through cache in front of another fetcher
pub struct CachedFetcher<F> {
    inner: F,
    cache: Box<dyn PageCache>,
}

impl<F: Fetcher> CachedFetcher<F> {
    pub fn new(inner: F, cache: Box<dyn PageCache>) -> Self {
        Self { inner, cache }
    }

    fn post_key(url: &str, body: &Value) -> String {
        format!("POST {url} {body}")
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachedFetcher<F> {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        if let Some(hit) = self.cache.get(url).await? {
            return Ok(Page::new(hit.final_url, hit.body));
        }

        let page = self.inner.get(url).await?;
        self.cache
            .put(url, &CachedPage::new(page.url.clone(), page.body.clone()))
            .await?;
        Ok(page)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        let key = Self::post_key(url, body);
        if let Some(hit) = self.cache.get(&key).await? {
            if let Ok(value) = serde_json::from_str(&hit.body) {
                return Ok(value);
            }
            tracing::warn!(url = %url, "Cached JSON response is unreadable, refetching");
        }

        let value = self.inner.post_json(url, body).await?;
        self.cache
            .put(&key, &CachedPage::new(url, value.to_string()))
            .await?;
        Ok(value)
    }

    async fn evict(&self, url: &str) -> Result<(), FetchError> {
        self.cache.evict(url).await?;
        self.inner.evict(url).await
    }
}
