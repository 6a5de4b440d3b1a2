//! Search index provider trait definition.
//!
//! This module defines the abstract interface for the write path into the
//! search engine, allowing for different backend implementations
//! (OpenSearch, Elasticsearch, in-memory fakes for tests).

use async_trait::async_trait;
use serde_json::Value;

use crate::bulk::BulkRequestBody;
use crate::errors::SearchIndexError;

/// Raw answer of the engine to a write request.
///
/// Non-success statuses are not errors at this layer: the caller classifies
/// them through the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// HTTP status code of the exchange.
    pub status: u16,
    /// Response body as returned by the engine.
    pub body: String,
}

impl WireResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// Implementations own the connection pool; callers only bound how many
/// logical requests they issue concurrently.
///
/// Methods return `Err(SearchIndexError)` only when no response was obtained
/// (connection failure, client-side timeout, unserializable request). Any
/// response the engine produced, whatever its status, is returned as a
/// [`WireResponse`].
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Send a newline-delimited bulk request.
    ///
    /// # Arguments
    ///
    /// * `request` - The encoded action/body lines
    /// * `refresh` - Whether the engine should refresh affected shards
    ///
    /// # Returns
    ///
    /// * `Ok(WireResponse)` - The raw bulk response
    /// * `Err(SearchIndexError)` - If the exchange failed before a response
    async fn send_bulk(
        &self,
        request: &BulkRequestBody,
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError>;

    /// Index (create or replace) a single document by id.
    async fn put_document(
        &self,
        index: &str,
        id: &str,
        body: &[u8],
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError>;

    /// Merge fields into a single document, creating it if it doesn't exist.
    async fn upsert_document(
        &self,
        index: &str,
        id: &str,
        body: &[u8],
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError>;

    /// Delete a single document by id.
    async fn delete_document(
        &self,
        index: &str,
        id: &str,
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError>;

    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create an index from a settings/mappings document.
    async fn create_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError>;

    /// Delete an index.
    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(SearchIndexError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchIndexError>;

    /// Create the index unless it already exists.
    async fn ensure_index_exists(
        &self,
        index: &str,
        settings: &Value,
    ) -> Result<(), SearchIndexError> {
        if self.index_exists(index).await? {
            return Ok(());
        }
        self.create_index(index, settings).await
    }

    /// Drop the index if present and recreate it empty.
    async fn clear_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError> {
        if self.index_exists(index).await? {
            self.delete_index(index).await?;
        }
        self.create_index(index, settings).await
    }
}
