//! Slug allocation with per-namespace uniqueness

use std::collections::HashSet;

use crate::utils::error::StoreError;
use crate::utils::slugify;

/// Slug namespaces of a knowledge store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Categories,
    Articles,
}

/// Which namespaces require globally unique slugs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugPolicy {
    pub unique_categories: bool,
    pub unique_articles: bool,
}

impl Default for SlugPolicy {
    fn default() -> Self {
        Self {
            unique_categories: true,
            unique_articles: true,
        }
    }
}

/// Hands out URL-safe slugs, disambiguating collisions with `-2`, `-3`, ...
#[derive(Debug, Clone, Default)]
pub struct SlugAllocator {
    policy: SlugPolicy,
    categories: HashSet<String>,
    articles: HashSet<String>,
}

impl SlugAllocator {
    #[must_use]
    pub fn new(policy: SlugPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn policy(&self) -> SlugPolicy {
        self.policy
    }

    /// Allocate a slug for `desired_text`, or for `explicit_slug` when given
    ///
    /// # Errors
    ///
    /// Returns `StoreError::EmptySlug` when the source text slugifies to
    /// nothing (empty, whitespace only, or no transliterable character).
    pub fn allocate(
        &mut self,
        namespace: Namespace,
        desired_text: &str,
        explicit_slug: Option<&str>,
    ) -> Result<String, StoreError> {
        let source = explicit_slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(desired_text);
        let base = slugify(source);
        if base.is_empty() {
            return Err(StoreError::EmptySlug(source.to_string()));
        }

        let unique = match namespace {
            Namespace::Categories => self.policy.unique_categories,
            Namespace::Articles => self.policy.unique_articles,
        };
        let used = match namespace {
            Namespace::Categories => &mut self.categories,
            Namespace::Articles => &mut self.articles,
        };

        if !unique || !used.contains(&base) {
            used.insert(base.clone());
            return Ok(base);
        }

        let mut index = 2;
        loop {
            let candidate = format!("{base}-{index}");
            if !used.contains(&candidate) {
                used.insert(candidate.clone());
                return Ok(candidate);
            }
            index += 1;
        }
    }

    /// Whether a slug was already handed out in the namespace
    #[must_use]
    pub fn is_used(&self, namespace: Namespace, slug: &str) -> bool {
        match namespace {
            Namespace::Categories => self.categories.contains(slug),
            Namespace::Articles => self.articles.contains(slug),
        }
    }
}
