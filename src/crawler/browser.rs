//! Scripted-browser fetcher over the Chrome DevTools protocol
//!
//! Used for client-rendered sites whose markup only exists after scripts
//! ran. Every navigation is bounded by a timeout and retried on timeout
//! only; other failures surface immediately.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::{Fetcher, Page};
use crate::config::FetcherConfig;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig, RetryError};

/// Fetcher driving a running Chrome instance
pub struct BrowserFetcher {
    browser: Browser,
    handler: JoinHandle<()>,
    timeout: Duration,
    retry: RetryConfig,
}

impl BrowserFetcher {
    /// Connect to the DevTools endpoint of a running browser
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Browser` when the endpoint is unreachable
    pub async fn connect(config: &FetcherConfig) -> Result<Self, FetchError> {
        let (browser, mut handler) = Browser::connect(config.browser_endpoint.clone())
            .await
            .map_err(|e| {
                FetchError::Browser(format!(
                    "Failed to connect to {}: {e}",
                    config.browser_endpoint
                ))
            })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler stopped");
                    break;
                }
            }
        });

        tracing::info!(endpoint = %config.browser_endpoint, "Connected to browser");
        Ok(Self {
            browser,
            handler,
            timeout: Duration::from_secs(config.browser_timeout_secs),
            retry: RetryConfig::with_delays(config.browser_max_attempts, 1000, 10_000),
        })
    }

    async fn navigate(&self, url: &str) -> Result<Page, FetchError> {
        let load = async {
            let page = self
                .browser
                .new_page(url)
                .await
                .map_err(|e| FetchError::Browser(format!("{url}: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| FetchError::Browser(format!("{url}: {e}")))?;

            let body = page
                .content()
                .await
                .map_err(|e| FetchError::Browser(format!("{url}: {e}")))?;
            let final_url = page
                .url()
                .await
                .map_err(|e| FetchError::Browser(format!("{url}: {e}")))?
                .unwrap_or_else(|| url.to_string());

            if let Err(e) = page.close().await {
                tracing::debug!(url = %url, error = %e, "Failed to close tab");
            }
            Ok(Page::new(final_url, body))
        };

        tokio::time::timeout(self.timeout, load)
            .await
            .map_err(|_| FetchError::Timeout(url.to_string()))?
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        tracing::debug!(url = %url, "Navigating");

        with_retry_if(&self.retry, |_| self.navigate(url), FetchError::is_timeout)
            .await
            .map_err(|e| match e {
                RetryError::Fatal(e) => e,
                RetryError::Exhausted { attempts, .. } => FetchError::MaxRetriesExceeded {
                    url: url.to_string(),
                    attempts,
                },
            })
    }

    async fn post_json(&self, url: &str, _body: &Value) -> Result<Value, FetchError> {
        Err(FetchError::Browser(format!(
            "JSON requests are not supported by the browser fetcher ({url})"
        )))
    }
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
