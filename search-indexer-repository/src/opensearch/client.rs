//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::{
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
    params::Refresh,
    BulkParts, DeleteParts, IndexParts, OpenSearch, UpdateParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::bulk::BulkRequestBody;
use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::{SearchIndexProvider, WireResponse};

/// OpenSearch client implementation.
///
/// Write requests return the engine's raw status and body; classification is
/// left to the caller.
///
/// # Example
///
/// ```ignore
/// use search_indexer_repository::{OpenSearchClient, SearchIndexConfig, SearchIndexProvider};
///
/// let client = OpenSearchClient::new(&SearchIndexConfig::new("http://localhost:9200"))?;
/// let response = client
///     .put_document("people", "http://example.org/p/1", br#"{"name":"Ada"}"#, true)
///     .await?;
/// assert!(response.is_success());
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the configured URL.
    ///
    /// # Arguments
    ///
    /// * `config` - URL and optional request timeout
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub fn new(config: &SearchIndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool).disable_proxy();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let transport = builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(url = %config.url, "Created OpenSearch client");

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    fn refresh(refresh: bool) -> Refresh {
        if refresh {
            Refresh::True
        } else {
            Refresh::False
        }
    }

    fn send_error(e: opensearch::Error) -> SearchIndexError {
        if e.is_timeout() {
            SearchIndexError::timeout(e.to_string())
        } else {
            SearchIndexError::connection(e.to_string())
        }
    }

    fn parse_body(id: &str, body: &[u8]) -> Result<Value, SearchIndexError> {
        serde_json::from_slice(body)
            .map_err(|e| SearchIndexError::validation(format!("Invalid body for {}: {}", id, e)))
    }

    async fn into_wire(response: Response) -> Result<WireResponse, SearchIndexError> {
        let status = response.status_code().as_u16();
        let body = response.text().await.map_err(Self::send_error)?;
        Ok(WireResponse { status, body })
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    #[instrument(skip(self, request), fields(lines = request.lines().len()))]
    async fn send_bulk(
        &self,
        request: &BulkRequestBody,
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError> {
        let response = self
            .client
            .bulk(BulkParts::None)
            .refresh(Self::refresh(refresh))
            .body(request.lines().to_vec())
            .send()
            .await
            .map_err(Self::send_error)?;

        let wire = Self::into_wire(response).await?;
        debug!(status = wire.status, "Bulk request answered");
        Ok(wire)
    }

    async fn put_document(
        &self,
        index: &str,
        id: &str,
        body: &[u8],
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError> {
        let doc = Self::parse_body(id, body)?;

        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .refresh(Self::refresh(refresh))
            .body(doc)
            .send()
            .await
            .map_err(Self::send_error)?;

        Self::into_wire(response).await
    }

    /// Use upsert to create the document if it doesn't exist.
    /// API reference: https://docs.opensearch.org/latest/api-reference/document-apis/update-document/#using-the-upsert-operation
    async fn upsert_document(
        &self,
        index: &str,
        id: &str,
        body: &[u8],
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError> {
        let doc = Self::parse_body(id, body)?;

        let response = self
            .client
            .update(UpdateParts::IndexId(index, id))
            .refresh(Self::refresh(refresh))
            .body(json!({
                "doc": doc,
                "doc_as_upsert": true
            }))
            .send()
            .await
            .map_err(Self::send_error)?;

        Self::into_wire(response).await
    }

    async fn delete_document(
        &self,
        index: &str,
        id: &str,
        refresh: bool,
    ) -> Result<WireResponse, SearchIndexError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .refresh(Self::refresh(refresh))
            .send()
            .await
            .map_err(Self::send_error)?;

        Self::into_wire(response).await
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(Self::send_error)?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SearchIndexError::index_management(format!(
                "Existence check for '{}' returned status {}",
                index, status
            ))),
        }
    }

    #[instrument(skip(self, settings))]
    async fn create_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(settings.clone())
            .send()
            .await
            .map_err(Self::send_error)?;

        let wire = Self::into_wire(response).await?;
        let acknowledged = serde_json::from_str::<Value>(&wire.body)
            .ok()
            .and_then(|v| v.get("acknowledged").and_then(Value::as_bool))
            .unwrap_or(false);

        if !wire.is_success() || !acknowledged {
            error!(status = wire.status, body = %wire.body, "Index creation failed");
            return Err(SearchIndexError::index_management(format!(
                "Error while creating index '{}': status {}",
                index, wire.status
            )));
        }

        info!(index = %index, "Created index");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(Self::send_error)?;

        let wire = Self::into_wire(response).await?;
        if !wire.is_success() {
            error!(status = wire.status, body = %wire.body, "Index deletion failed");
            return Err(SearchIndexError::index_management(format!(
                "Error while deleting index '{}': status {}",
                index, wire.status
            )));
        }

        info!(index = %index, "Deleted index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(Self::send_error)?;

        let wire = Self::into_wire(response).await?;
        if !wire.is_success() {
            return Ok(false);
        }

        let status = serde_json::from_str::<Value>(&wire.body)
            .ok()
            .and_then(|v| v.get("status").and_then(Value::as_str).map(str::to_string));

        debug!(cluster_status = ?status, "Cluster health");
        Ok(matches!(status.as_deref(), Some("green") | Some("yellow")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        let result = OpenSearchClient::new(&SearchIndexConfig::new("not a url"));
        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
    }

    #[test]
    fn test_parse_body_rejects_invalid_json() {
        let err = OpenSearchClient::parse_body("doc-1", b"{not json").unwrap_err();
        assert!(matches!(err, SearchIndexError::ValidationError(_)));
    }

    #[test]
    fn test_refresh_param() {
        assert!(matches!(OpenSearchClient::refresh(true), Refresh::True));
        assert!(matches!(OpenSearchClient::refresh(false), Refresh::False));
    }
}
