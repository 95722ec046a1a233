pub mod export;

// Re-export command functions for convenience
pub use export::{export, ExportParams};
