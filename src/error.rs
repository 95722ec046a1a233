//! Unified error handling for the kb-exporter crate
//!
//! This module provides a unified error type that consolidates the domain
//! errors into a single `Error` enum, while keeping the domain errors usable
//! on their own.
//!
//! # Architecture
//!
//! - [`ExportErrorTrait`] - Common interface implemented by the error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors

use std::io;
use thiserror::Error;

pub use crate::utils::error::{FetchError, ParseError, StoreError};

/// Common trait for the crate's error types
pub trait ExportErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, browser)
    Network,
    /// Unexpected source shape and normalization errors
    Parsing,
    /// Knowledge store preconditions and I/O
    Storage,
    /// Configuration and platform selection errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short human readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parsing => "unexpected source shape",
            Self::Storage => "storage error",
            Self::Config => "configuration error",
            Self::Other => "error",
        }
    }
}

/// Unified error type for the kb-exporter crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Unexpected source shape or unknown markup
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Knowledge store precondition violation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Platform name not registered
    #[error("Service {0} is not available to be automatically imported yet")]
    NotImplemented(String),
}

impl ExportErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        self.is_timeout()
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Cache(_) => ErrorCategory::Storage,
            Self::InvalidUrl(_) => ErrorCategory::Config,
            _ => ErrorCategory::Network,
        }
    }
}

impl ExportErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            _ => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(_) | Self::Json(_) => ErrorCategory::Parsing,
            Self::Store(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) | Self::NotImplemented(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
