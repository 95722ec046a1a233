//! Integration tests module
//!
//! End-to-end tests of the exporter against wiremock sites, including:
//! - Complete crawl → normalize → serialize runs per platform
//! - Error handling scenarios

pub mod error_scenarios;
pub mod export_test;
