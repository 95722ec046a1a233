//! kb-exporter - knowledge base exporter
//!
//! Crawls a hosted help center / documentation site and rebuilds it as a
//! standardized JSON document: site metadata, a category tree and articles
//! whose HTML is normalized to a small, fixed dialect.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Page fetching (HTTP, scripted browser, cache wrapper)
//! - [`cache`] - On-disk page cache
//! - [`parser`] - Owned DOM, normalization engine and shared media rules
//! - [`platforms`] - One adapter per knowledge base platform
//! - [`models`] - Core data structures and types
//! - [`storage`] - Knowledge store, slug allocation and the export document
//! - [`exporter`] - Top-level orchestration
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use kb_exporter::config::Config;
//! use kb_exporter::exporter::Exporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let exporter = Exporter::new(Config::from_env()?);
//!     let export = exporter.export("helpscout", "https://docs.example.com/", None).await?;
//!     println!("{}", export.to_json(true)?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod crawler;
pub mod error;
pub mod exporter;
pub mod models;
pub mod parser;
pub mod platforms;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{Fetcher, HttpFetcher, Page};
    pub use crate::error::{Error, ErrorCategory, ExportErrorTrait, Result};
    pub use crate::exporter::Exporter;
    pub use crate::models::{Article, Category, Link, LinkPosition, Metadata};
    pub use crate::platforms::{Platform, Registry, Session};
    pub use crate::storage::{Export, KnowledgeStore};
}

// Direct re-exports for convenience
pub use exporter::Exporter;
pub use storage::Export;
