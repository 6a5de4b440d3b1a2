//! Dependency initialization and wiring for the search indexer.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::IndexerSettings;
use crate::IndexingError;
use search_indexer_pipeline::{
    loader::BulkSubmitter,
    orchestrator::Orchestrator,
    processor::{MappingConfig, ResourceProcessor},
};
use search_indexer_repository::{OpenSearchClient, SearchIndexConfig};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Where the session reads resources from.
    pub source_path: PathBuf,
    /// Whether indices are recreated before the session.
    pub reset_indices: bool,
}

impl Dependencies {
    /// Build the orchestrator from settings and verify the cluster.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the mappings are unusable or the cluster is unreachable
    pub async fn new(settings: IndexerSettings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            mapping_path = %settings.mapping_path.display(),
            source_path = %settings.source_path.display(),
            "Initializing dependencies"
        );

        let mut search_config = SearchIndexConfig::new(&settings.opensearch_url);
        if let Some(timeout) = settings.opensearch_timeout {
            search_config = search_config.with_request_timeout(timeout);
        }
        let search_client = OpenSearchClient::new(&search_config).map_err(|e| {
            IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
        })?;

        let mappings = MappingConfig::load(&settings.mapping_path).await?;
        info!(entities = mappings.entities.len(), "Entity mappings loaded");

        let processor = ResourceProcessor::new(mappings);
        let submitter = BulkSubmitter::new(Arc::new(search_client), &settings.pipeline);
        let orchestrator = Orchestrator::new(processor, submitter, settings.pipeline)?;

        let healthy = orchestrator
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;
        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        Ok(Self {
            orchestrator,
            source_path: settings.source_path,
            reset_indices: settings.reset_indices,
        })
    }
}
