//! # Search Indexer
//!
//! Main library for the resource search indexer.
//!
//! This crate provides the entry point, configuration and input source for
//! running one indexing session of the pipeline.

pub mod config;
pub mod source;

pub use config::{Dependencies, IndexerSettings};
pub use source::JsonLinesSource;

use search_indexer_pipeline::reconciler::SessionSummary;
use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] search_indexer_pipeline::PipelineError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] search_indexer_repository::SearchIndexError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Whether a session indexed its whole input.
///
/// An aborted session is not clean, and neither is a completed one whose
/// source broke before its end.
pub fn is_clean_run(summary: &SessionSummary) -> bool {
    summary.is_completed() && summary.source_error.is_none()
}
