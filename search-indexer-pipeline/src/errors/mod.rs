//! Error types for the search indexer pipeline.

use search_indexer_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur in the search indexer pipeline.
///
/// Per-document failures are reported as outcomes, not as `PipelineError`.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid pipeline or mapping configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from the resource source.
    #[error("Source error: {0}")]
    SourceError(String),

    /// Error from the loader component.
    #[error("Loader error: {0}")]
    LoaderError(String),

    /// Error from the search engine.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a source error.
    pub fn source_failure(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    /// Create a loader error.
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::LoaderError(msg.into())
    }
}

/// A resource that cannot be mapped to a valid document.
///
/// Always fatal for that resource; the session records it and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformationError {
    #[error("no mapping for entity type '{0}'")]
    UnknownEntityType(String),

    #[error("resource has no identifier")]
    MissingIdentifier,

    #[error("resource {resource_id} is missing required field '{field}'")]
    MissingField { resource_id: String, field: String },

    #[error("resource {resource_id} has an invalid payload: {message}")]
    InvalidPayload { resource_id: String, message: String },
}
