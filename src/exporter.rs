//! Export orchestration
//!
//! [`Exporter`] picks the platform adapter by name, builds the fetch stack
//! the adapter needs (HTTP or scripted browser, optionally behind the disk
//! cache) and runs one crawl into a fresh [`Export`].

use tracing::info;

use crate::cache::DiskCache;
use crate::config::Config;
use crate::crawler::{CachedFetcher, Fetcher, HttpFetcher};
use crate::error::{Error, Result};
use crate::platforms::{Platform, Registry, Session, Transport};
use crate::storage::Export;

/// Runs exports with one configuration
pub struct Exporter {
    config: Config,
    registry: Registry,
}

impl Exporter {
    /// Exporter over every built-in platform
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Registry::new())
    }

    #[must_use]
    pub fn with_registry(config: Config, registry: Registry) -> Self {
        Self { config, registry }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export the knowledge base at `url` with the adapter named `service`
    ///
    /// The adapter is resolved before any network activity.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotImplemented` for an unknown service, and any fatal
    /// fetch, parse or store error of the crawl.
    pub async fn export(&self, service: &str, url: &str, language: Option<&str>) -> Result<Export> {
        let platform = self.registry.resolve(service)?;
        let fetcher = self.build_fetcher(platform.transport()).await?;
        export_with(platform.as_ref(), &fetcher, url, language).await
    }

    /// Fetch stack for `transport`, wrapped in the page cache when enabled
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client, browser connection or cache directory
    /// cannot be set up.
    pub async fn build_fetcher(&self, transport: Transport) -> Result<Box<dyn Fetcher>> {
        let fetcher: Box<dyn Fetcher> = match transport {
            Transport::Http => Box::new(HttpFetcher::with_config(&self.config.fetcher)?),
            Transport::Browser => browser_fetcher(&self.config).await?,
        };

        if !self.config.cache.enabled {
            return Ok(fetcher);
        }

        let cache = DiskCache::new(&self.config.cache.directory)?;
        info!(directory = %cache.directory().display(), "Page cache enabled");
        Ok(Box::new(CachedFetcher::new(fetcher, Box::new(cache))))
    }
}

#[cfg(feature = "browser")]
async fn browser_fetcher(config: &Config) -> Result<Box<dyn Fetcher>> {
    let fetcher = crate::crawler::BrowserFetcher::connect(&config.fetcher).await?;
    Ok(Box::new(fetcher))
}

#[cfg(not(feature = "browser"))]
async fn browser_fetcher(_config: &Config) -> Result<Box<dyn Fetcher>> {
    Err(Error::config(
        "this service renders its pages with scripts; rebuild with the `browser` feature",
    ))
}

/// Run `platform` over `url` with an existing fetcher
///
/// The language filter is matched lowercase.
///
/// # Errors
///
/// Propagates the first fatal error of the crawl; no partial export is
/// returned.
pub async fn export_with(
    platform: &dyn Platform,
    fetcher: &dyn Fetcher,
    url: &str,
    language: Option<&str>,
) -> Result<Export> {
    let language = language.map(str::to_lowercase);
    info!(service = platform.name(), url = %url, language = ?language, "Starting export");

    let mut session = Session::new(fetcher);
    platform.load(&mut session, url, language.as_deref()).await?;
    let export = session.into_export();

    for language in export.languages() {
        if let Some(store) = export.get(language) {
            info!(
                language = %language,
                categories = store.categories().len(),
                articles = store.articles().len(),
                "Language exported"
            );
        }
    }
    Ok(export)
}
