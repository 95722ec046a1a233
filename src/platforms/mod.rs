//! Knowledge base platform adapters
//!
//! Every supported platform implements [`Platform`]: `load` crawls one site
//! and records what it finds through a [`Session`], which owns the export,
//! tracks the active language and exposes the fetch and store helpers the
//! adapters share.
//!
//! Adapters are selected by name through the [`Registry`].

pub mod clickconnector;
pub mod crisp;
pub mod gitbook;
pub mod helpkit;
pub mod helpscout;
pub mod next;
pub mod notion;
#[cfg(test)]
mod testing;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::crawler::url::resolve_url;
use crate::crawler::{Fetcher, Page};
use crate::error::{Error, Result};
use crate::models::{
    ArticleId, CategoryId, Link, LinkPosition, Metadata, NewArticle, NewCategory,
};
use crate::parser::Document;
use crate::storage::{Export, KnowledgeStore};
use crate::utils::error::StoreError;
use crate::utils::is_absolute_url;

/// How an adapter needs its pages fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain HTTP requests
    Http,
    /// Scripted browser, for client-rendered sites
    Browser,
}

/// A crawler and normalizer for one knowledge base platform
#[async_trait(?Send)]
pub trait Platform {
    /// Registry name
    fn name(&self) -> &'static str;

    fn transport(&self) -> Transport {
        Transport::Http
    }

    /// Crawl the site at `base_url`, registering each language variant
    /// found (or only `language` when given) in the session
    async fn load(
        &self,
        session: &mut Session<'_>,
        base_url: &str,
        language: Option<&str>,
    ) -> Result<()>;
}

type Factory = fn() -> Box<dyn Platform>;

/// Platform lookup by name
pub struct Registry {
    factories: IndexMap<String, Factory>,
}

impl Registry {
    /// Registry without platforms
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Registry with every built-in platform
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("crisp", || Box::new(crisp::Crisp));
        registry.register("helpscout", || Box::new(helpscout::Helpscout));
        registry.register("helpkit", || Box::new(helpkit::Helpkit));
        registry.register("gitbook", || Box::new(gitbook::Gitbook));
        registry.register("next", || Box::new(next::Next));
        registry.register("intercom", || Box::new(next::Next));
        registry.register("notion", || Box::new(notion::Notion));
        registry.register("clickconnector", || Box::new(clickconnector::ClickConnector));
        registry
    }

    pub fn register(&mut self, name: &str, factory: Factory) {
        self.factories.insert(Self::normalize_name(name), factory);
    }

    /// Lowercase, without `_`, `-` and spaces (`Help_Scout` → `helpscout`)
    #[must_use]
    pub fn normalize_name(name: &str) -> String {
        name.chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Instantiate the platform registered under `name`
    ///
    /// # Errors
    ///
    /// Returns `Error::NotImplemented` for an unknown name.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Platform>> {
        self.factories
            .get(&Self::normalize_name(name))
            .map(|factory| factory())
            .ok_or_else(|| Error::NotImplemented(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Crawl state shared by an adapter run
pub struct Session<'a> {
    fetcher: &'a dyn Fetcher,
    export: Export,
    current: Option<String>,
}

impl<'a> Session<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self {
            fetcher,
            export: Export::new(),
            current: None,
        }
    }

    /// Register a language variant and make it the active one
    ///
    /// # Errors
    ///
    /// Fails when the language is already registered.
    pub fn add_language(&mut self, language: &str, base_url: &str) -> Result<()> {
        self.export.add_language(language, base_url)?;
        self.current = Some(language.to_string());
        Ok(())
    }

    #[must_use]
    pub fn current_language(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The active store
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoActiveLanguage` before any `add_language`.
    pub fn store(&self) -> Result<&KnowledgeStore> {
        self.current
            .as_deref()
            .and_then(|language| self.export.get(language))
            .ok_or_else(|| StoreError::NoActiveLanguage.into())
    }

    fn store_mut(&mut self) -> Result<&mut KnowledgeStore> {
        let language = self.current.as_deref().ok_or(StoreError::NoActiveLanguage)?;
        self.export
            .get_mut(language)
            .ok_or_else(|| StoreError::NoActiveLanguage.into())
    }

    /// Base URL of the active language
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoActiveLanguage` before any `add_language`.
    pub fn base_url(&self) -> Result<String> {
        Ok(self.store()?.base_url().to_string())
    }

    /// Resolve `target` against the active base URL; absolute URLs pass through
    ///
    /// # Errors
    ///
    /// Fails for a relative target without an active language.
    pub fn resolve(&self, target: &str) -> Result<String> {
        if is_absolute_url(target.trim()) {
            return Ok(target.trim().to_string());
        }
        Ok(resolve_url(&self.base_url()?, target)?)
    }

    /// Fetch a page
    ///
    /// # Errors
    ///
    /// Propagates fetch failures.
    pub async fn get_page(&self, url: &str) -> Result<Page> {
        let url = self.resolve(url)?;
        Ok(self.fetcher.get(&url).await?)
    }

    /// Fetch and parse an HTML page
    ///
    /// # Errors
    ///
    /// Propagates fetch failures.
    pub async fn get_html(&self, url: &str) -> Result<Document> {
        let page = self.get_page(url).await?;
        Ok(Document::parse(page.url, &page.body))
    }

    /// POST a JSON body and return the decoded response
    ///
    /// # Errors
    ///
    /// Propagates fetch failures.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let url = self.resolve(url)?;
        Ok(self.fetcher.post_json(&url, body).await?)
    }

    /// Drop any cached copy of `url`
    ///
    /// # Errors
    ///
    /// Propagates cache failures.
    pub async fn evict(&self, url: &str) -> Result<()> {
        let url = self.resolve(url)?;
        Ok(self.fetcher.evict(&url).await?)
    }

    /// Add a category to the active store
    ///
    /// # Errors
    ///
    /// Propagates store precondition violations.
    pub fn save_category(
        &mut self,
        parent: Option<&CategoryId>,
        entry: NewCategory,
    ) -> Result<CategoryId> {
        Ok(self.store_mut()?.add_category(parent, entry)?)
    }

    /// Add an article (resolving a relative source URL) and file it under
    /// `category`
    ///
    /// # Errors
    ///
    /// Propagates store precondition violations.
    pub fn save_article(
        &mut self,
        category: Option<&CategoryId>,
        mut entry: NewArticle,
    ) -> Result<ArticleId> {
        if !entry.previous_url.trim().is_empty() && !is_absolute_url(&entry.previous_url) {
            entry.previous_url = self.resolve(&entry.previous_url)?;
        }

        let store = self.store_mut()?;
        let id = store.add_article(entry)?;
        if let Some(category) = category {
            store.add_article_to_category(&id, category)?;
        }
        Ok(id)
    }

    /// File an already saved article under another category
    ///
    /// # Errors
    ///
    /// Fails when either identifier is unknown.
    pub fn add_article_to_category(
        &mut self,
        article: &ArticleId,
        category: &CategoryId,
    ) -> Result<()> {
        Ok(self.store_mut()?.add_article_to_category(article, category)?)
    }

    /// Merge metadata into the active store
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoActiveLanguage` before any `add_language`.
    pub fn set_metadata(&mut self, partial: Metadata) -> Result<()> {
        self.store_mut()?.set_metadata(partial);
        Ok(())
    }

    /// Append a navigation link with an explicit sort key
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoActiveLanguage` before any `add_language`.
    pub fn push_link(&mut self, link: Link) -> Result<()> {
        let store = self.store_mut()?;
        let mut metadata = Metadata {
            links: store.metadata().links.clone(),
            ..Default::default()
        };
        debug!(title = %link.title, url = %link.url, "Added link");
        metadata.push_link(link);
        store.set_metadata(metadata);
        Ok(())
    }

    /// Append a navigation link sorted after the links of its position
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoActiveLanguage` before any `add_language`.
    pub fn add_link(&mut self, title: &str, url: &str, position: LinkPosition) -> Result<()> {
        let sort = self
            .store()?
            .metadata()
            .links
            .iter()
            .flatten()
            .filter(|link| link.position == position)
            .count();
        let sort = i64::try_from(sort).unwrap_or(i64::MAX - 1) + 1;
        self.push_link(Link::new(title, url, sort, position))
    }

    #[must_use]
    pub fn export(&self) -> &Export {
        &self.export
    }

    #[must_use]
    pub fn into_export(self) -> Export {
        self.export
    }
}
