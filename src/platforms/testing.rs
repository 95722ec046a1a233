//! In-memory site used by the adapter unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::crawler::{Fetcher, Page};
use crate::utils::error::FetchError;

/// Serves canned pages by absolute URL and records evictions
#[derive(Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    posts: HashMap<String, Value>,
    pub evicted: Mutex<Vec<String>>,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    /// Answer POSTs to `url` whose body contains `needle`
    pub fn post(mut self, url: &str, needle: &str, response: Value) -> Self {
        self.posts.insert(format!("{url} {needle}"), response);
        self
    }

    pub fn evictions(&self) -> Vec<String> {
        self.evicted.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for StaticSite {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        self.pages
            .get(url)
            .map(|body| Page::new(url, body.clone()))
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        let text = body.to_string();
        self.posts
            .iter()
            .find(|(key, _)| {
                key.split_once(' ')
                    .is_some_and(|(u, needle)| u == url && text.contains(needle))
            })
            .map(|(_, value)| value.clone())
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    async fn evict(&self, url: &str) -> Result<(), FetchError> {
        if let Ok(mut evicted) = self.evicted.lock() {
            evicted.push(url.to_string());
        }
        Ok(())
    }
}
