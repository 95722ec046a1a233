//! In-memory knowledge store and multi-language export
//!
//! One [`KnowledgeStore`] holds the categories, articles and metadata of a
//! single language variant of a site. All mutation goes through the store's
//! operations so the invariants (existing parents, absolute source URLs,
//! unique slugs) hold for every record.

pub mod export;
pub mod slug;

pub use export::Export;
pub use slug::{Namespace, SlugAllocator, SlugPolicy};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{
    Article, ArticleId, Category, CategoryId, Metadata, NewArticle, NewCategory,
};
use crate::utils::error::StoreError;
use crate::utils::is_absolute_url;

/// Language-keyed aggregate of categories, articles and metadata
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStore {
    base_url: String,
    language: String,
    metadata: Metadata,
    categories: IndexMap<CategoryId, Category>,
    articles: IndexMap<ArticleId, Article>,
    #[serde(skip)]
    slugs: SlugAllocator,
}

impl KnowledgeStore {
    /// Create an empty store with unique slugs in both namespaces
    pub fn new(language: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::with_policy(language, base_url, SlugPolicy::default())
    }

    pub fn with_policy(
        language: impl Into<String>,
        base_url: impl Into<String>,
        policy: SlugPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            language: language.into(),
            metadata: Metadata::default(),
            categories: IndexMap::new(),
            articles: IndexMap::new(),
            slugs: SlugAllocator::new(policy),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn categories(&self) -> &IndexMap<CategoryId, Category> {
        &self.categories
    }

    #[must_use]
    pub fn articles(&self) -> &IndexMap<ArticleId, Article> {
        &self.articles
    }

    #[must_use]
    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.get(id)
    }

    #[must_use]
    pub fn article(&self, id: &ArticleId) -> Option<&Article> {
        self.articles.get(id)
    }

    /// Add a category under `parent` (or at the root)
    ///
    /// # Errors
    ///
    /// Fails when the title is empty, the parent does not exist, or no slug
    /// can be derived.
    pub fn add_category(
        &mut self,
        parent: Option<&CategoryId>,
        entry: NewCategory,
    ) -> Result<CategoryId, StoreError> {
        if entry.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        if let Some(parent) = parent {
            if !self.categories.contains_key(parent) {
                return Err(StoreError::UnknownCategory(parent.to_string()));
            }
        }

        let slug = self
            .slugs
            .allocate(Namespace::Categories, &entry.title, entry.slug.as_deref())?;

        let id = CategoryId::generate();
        info!(title = %entry.title, slug = %slug, "Added collection");
        self.categories.insert(
            id.clone(),
            Category {
                title: entry.title,
                url: entry.url,
                slug,
                icon: entry.icon,
                description: entry.description,
                seo_title: entry.seo_title,
                seo_description: entry.seo_description,
                parent: parent.cloned(),
                articles: Vec::new(),
            },
        );

        Ok(id)
    }

    /// Add an article; `created` falls back to `last_updated`
    ///
    /// # Errors
    ///
    /// Fails when the title, content or source URL is missing, or when the
    /// source URL is not absolute.
    pub fn add_article(&mut self, entry: NewArticle) -> Result<ArticleId, StoreError> {
        if entry.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        if entry.content.trim().is_empty() {
            return Err(StoreError::EmptyContent(entry.title));
        }
        if entry.previous_url.trim().is_empty() {
            return Err(StoreError::MissingPreviousUrl(entry.title));
        }
        if !is_absolute_url(&entry.previous_url) {
            return Err(StoreError::RelativePreviousUrl(entry.previous_url));
        }

        let slug = self
            .slugs
            .allocate(Namespace::Articles, &entry.title, entry.slug.as_deref())?;

        let created = entry.created.or_else(|| entry.last_updated.clone());

        let id = ArticleId::generate();
        info!(title = %entry.title, slug = %slug, "Added article");
        self.articles.insert(
            id.clone(),
            Article {
                title: entry.title,
                content: entry.content,
                previous_url: entry.previous_url,
                slug,
                description: entry.description,
                seo_title: entry.seo_title,
                seo_description: entry.seo_description,
                created,
                last_updated: entry.last_updated,
            },
        );

        Ok(id)
    }

    /// Associate an existing article with an existing category
    ///
    /// Adding the same pair twice keeps a single entry.
    ///
    /// # Errors
    ///
    /// Fails when either identifier is unknown.
    pub fn add_article_to_category(
        &mut self,
        article: &ArticleId,
        category: &CategoryId,
    ) -> Result<(), StoreError> {
        if !self.articles.contains_key(article) {
            return Err(StoreError::UnknownArticle(article.to_string()));
        }
        let entry = self
            .categories
            .get_mut(category)
            .ok_or_else(|| StoreError::UnknownCategory(category.to_string()))?;

        if entry.articles.contains(article) {
            debug!(article = %article, category = %category, "Article already in category");
            return Ok(());
        }
        entry.articles.push(article.clone());
        Ok(())
    }

    /// Merge `partial` into the metadata, overwriting the keys it carries
    pub fn set_metadata(&mut self, partial: Metadata) {
        self.metadata.merge(partial);
    }

    /// The interchange document of this language
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
