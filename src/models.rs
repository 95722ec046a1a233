//! Core data structures of the interchange document
//!
//! Records are owned by [`crate::storage::KnowledgeStore`]; adapters only
//! hold the identifiers handed back by the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Fresh random identifier
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(CategoryId);
opaque_id!(ArticleId);

/// A grouping node of the knowledge base navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub title: String,
    pub url: Option<String>,
    pub slug: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub parent: Option<CategoryId>,
    pub articles: Vec<ArticleId>,
}

/// A single exported article with normalized HTML content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub previous_url: String,
    pub slug: String,
    pub description: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub created: Option<String>,
    pub last_updated: Option<String>,
}

/// Fields accepted by `add_category`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCategory {
    pub title: String,
    pub url: Option<String>,
    pub slug: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

impl NewCategory {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Fields accepted by `add_article`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub previous_url: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub created: Option<String>,
    pub last_updated: Option<String>,
}

/// Where a navigation link is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPosition {
    Header,
    Footer,
}

/// A navigation link of the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub title: String,
    pub url: String,
    pub sort: i64,
    pub position: LinkPosition,
}

impl Link {
    pub fn new(title: impl Into<String>, url: impl Into<String>, sort: i64, position: LinkPosition) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            sort,
            position,
        }
    }
}

/// Site metadata; every field is optional so partial maps can be merged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
}

impl Metadata {
    /// Overwrite the fields present in `partial`, keep the others
    pub fn merge(&mut self, partial: Metadata) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if partial.$field.is_some() {
                    self.$field = partial.$field;
                })*
            };
        }
        take!(
            title,
            favicon,
            custom_domain,
            logo,
            accent_color,
            code,
            description,
            company_name,
            company_url,
            links
        );
    }

    /// Append a link, creating the list when needed
    pub fn push_link(&mut self, link: Link) {
        self.links.get_or_insert_with(Vec::new).push(link);
    }
}
