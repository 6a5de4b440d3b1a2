//! Loader module for the search indexer pipeline.
//!
//! Submits batches to the search index and turns whatever comes back into
//! exactly one classified outcome per document.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use search_indexer_repository::opensearch::default_index_settings;
use search_indexer_repository::{
    compact_body, decode_bulk_response, parse_error_body, BulkRequestBody, SearchIndexError,
    SearchIndexProvider, StatusPolicy, WireResponse,
};
use search_indexer_shared::{
    Batch, DocumentOperation, FailureReason, IndexDocument, ItemOutcome, OutcomeStatus,
};

/// Submits documents through the bulk and single-document endpoints.
///
/// Both paths classify through the same [`StatusPolicy`], so a caller sees
/// identical outcomes whichever path a document took.
pub struct BulkSubmitter {
    provider: Arc<dyn SearchIndexProvider>,
    policy: StatusPolicy,
    timeout: Duration,
    refresh: bool,
}

impl BulkSubmitter {
    /// Create a submitter with the policy and timeouts from `config`.
    pub fn new(provider: Arc<dyn SearchIndexProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            policy: config.status_policy.clone(),
            timeout: config.submission_timeout(),
            refresh: config.refresh,
        }
    }

    /// Submit a batch in one bulk exchange.
    ///
    /// Returns one outcome per document, in batch order. Never fails: a
    /// transport problem becomes a retryable outcome for every document.
    #[instrument(skip(self, batch), fields(batch_id = %batch.id(), count = batch.len(), size_bytes = batch.size_bytes()))]
    pub async fn submit(&self, batch: &Batch) -> Vec<ItemOutcome> {
        let documents = batch.documents();
        let request = BulkRequestBody::encode(documents);

        let mut statuses: Vec<OutcomeStatus> = vec![
            OutcomeStatus::FatalFailure(FailureReason::malformed("document was not encoded"));
            documents.len()
        ];
        for (position, message) in request.rejected() {
            warn!(document_id = %documents[*position].id(), error = %message, "Document cannot be encoded");
            statuses[*position] = OutcomeStatus::FatalFailure(FailureReason::malformed(message.clone()));
        }

        if !request.is_empty() {
            let encoded: Vec<&IndexDocument> =
                request.included().iter().map(|&i| &documents[i]).collect();
            let results = self.exchange(&request, &encoded).await;
            for (&position, status) in request.included().iter().zip(results) {
                statuses[position] = status;
            }
        }

        let succeeded = statuses.iter().filter(|s| s.is_success()).count();
        debug!(succeeded, failed = statuses.len() - succeeded, "Bulk submission finished");

        documents
            .iter()
            .zip(statuses)
            .map(|(doc, status)| ItemOutcome::new(doc.id(), status))
            .collect()
    }

    /// One bulk round trip for the encoded documents, in wire order.
    async fn exchange(
        &self,
        request: &BulkRequestBody,
        encoded: &[&IndexDocument],
    ) -> Vec<OutcomeStatus> {
        let response = match self
            .with_timeout(self.provider.send_bulk(request, self.refresh))
            .await
        {
            Ok(response) => response,
            Err(status) => return vec![status; encoded.len()],
        };

        if !response.is_success() {
            let (error_type, reason) = parse_error_body(&response.body);
            warn!(
                status = response.status,
                error_type = ?error_type,
                "Bulk request rejected as a whole"
            );
            return encoded
                .iter()
                .map(|doc| {
                    self.policy.classify(
                        doc.operation(),
                        response.status,
                        error_type.as_deref(),
                        reason.as_deref(),
                    )
                })
                .collect();
        }

        let expected_ids: Vec<&str> = encoded.iter().map(|doc| doc.id()).collect();
        match decode_bulk_response(&response.body, &expected_ids) {
            Ok(items) => encoded
                .iter()
                .zip(items.iter())
                .map(|(doc, item)| self.policy.classify_item(doc.operation(), item))
                .collect(),
            Err(e) => {
                error!(error = %e, "Bulk response does not match the request");
                vec![
                    OutcomeStatus::FatalFailure(FailureReason::protocol_violation(e.to_string()));
                    encoded.len()
                ]
            }
        }
    }

    /// Write a single document through the simple endpoint.
    ///
    /// Always refreshes so the correction is visible immediately.
    #[instrument(skip(self, document), fields(document_id = %document.id(), index = %document.index()))]
    pub async fn submit_one(&self, document: &IndexDocument) -> ItemOutcome {
        let provider = &self.provider;
        let (index, id) = (document.index(), document.id());
        let encoded = match document.operation() {
            DocumentOperation::Delete => String::new(),
            _ => match compact_body(document) {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "Document cannot be encoded");
                    return ItemOutcome::new(
                        id,
                        OutcomeStatus::FatalFailure(FailureReason::malformed(e.to_string())),
                    );
                }
            },
        };
        let body = encoded.as_bytes();
        let call = async move {
            match document.operation() {
                DocumentOperation::Upsert => provider.put_document(index, id, body, true).await,
                DocumentOperation::Merge => provider.upsert_document(index, id, body, true).await,
                DocumentOperation::Delete => provider.delete_document(index, id, true).await,
            }
        };

        let status = match self.with_timeout(call).await {
            Ok(response) => self.classify_response(document.operation(), &response),
            Err(status) => status,
        };
        debug!(success = status.is_success(), "Single document submission finished");
        ItemOutcome::new(id, status)
    }

    fn classify_response(&self, operation: DocumentOperation, response: &WireResponse) -> OutcomeStatus {
        if response.is_success() {
            return OutcomeStatus::Success;
        }
        let (error_type, reason) = parse_error_body(&response.body);
        self.policy
            .classify(operation, response.status, error_type.as_deref(), reason.as_deref())
    }

    /// Run a wire call under the submission timeout.
    ///
    /// Any failure to get a response is mapped to the outcome status every
    /// affected document receives.
    async fn with_timeout<F>(&self, call: F) -> Result<WireResponse, OutcomeStatus>
    where
        F: Future<Output = Result<WireResponse, SearchIndexError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                error!(error = %e, "Submission failed without a response");
                Err(failure_status(e))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Submission timed out");
                Err(OutcomeStatus::RetryableFailure(FailureReason::Timeout))
            }
        }
    }

    /// Check that the search engine is reachable and healthy.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(self.provider.health_check().await?)
    }

    /// Create an index when missing.
    #[instrument(skip(self, settings))]
    pub async fn ensure_index(&self, index: &str, settings: Option<&Value>) -> Result<(), PipelineError> {
        let settings = settings.cloned().unwrap_or_else(default_index_settings);
        self.provider.ensure_index_exists(index, &settings).await?;
        debug!(index = %index, "Index ready");
        Ok(())
    }

    /// Drop and recreate an index.
    #[instrument(skip(self, settings))]
    pub async fn reset_index(&self, index: &str, settings: Option<&Value>) -> Result<(), PipelineError> {
        let settings = settings.cloned().unwrap_or_else(default_index_settings);
        self.provider.clear_index(index, &settings).await?;
        info!(index = %index, "Index reset");
        Ok(())
    }
}

fn failure_status(error: SearchIndexError) -> OutcomeStatus {
    match error {
        SearchIndexError::Timeout(_) => OutcomeStatus::RetryableFailure(FailureReason::Timeout),
        e if e.is_transport() => {
            OutcomeStatus::RetryableFailure(FailureReason::transport(e.to_string()))
        }
        e => OutcomeStatus::FatalFailure(FailureReason::malformed(e.to_string())),
    }
}
