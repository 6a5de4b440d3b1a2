//! Status classification table.
//!
//! Maps the engine's native per-item status and error type onto
//! `Success | RetryableFailure | FatalFailure`. Both the bulk path and the
//! single-document path go through [`StatusPolicy::classify`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bulk::BulkItemResult;
use search_indexer_shared::{DocumentOperation, FailureReason, OutcomeStatus};

const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 409, 429, 502, 503, 504];

const DEFAULT_RETRYABLE_ERROR_TYPES: [&str; 6] = [
    "es_rejected_execution_exception",
    "circuit_breaking_exception",
    "version_conflict_engine_exception",
    "unavailable_shards_exception",
    "node_not_connected_exception",
    "cluster_block_exception",
];

/// Configuration-visible classification policy.
///
/// Rules, first match wins:
///
/// 1. 2xx is a success.
/// 2. 404 on a delete is a success (the document is already gone).
/// 3. A status in `retryable_statuses` is retryable.
/// 4. An error type in `retryable_error_types` is retryable.
/// 5. Everything else, including codes never seen before, is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPolicy {
    /// Status codes treated as transient.
    pub retryable_statuses: BTreeSet<u16>,
    /// Engine error types treated as transient regardless of status.
    pub retryable_error_types: BTreeSet<String>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            retryable_error_types: DEFAULT_RETRYABLE_ERROR_TYPES
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl StatusPolicy {
    /// Classify a native status code for a document written with `operation`.
    pub fn classify(
        &self,
        operation: DocumentOperation,
        status: u16,
        error_type: Option<&str>,
        reason: Option<&str>,
    ) -> OutcomeStatus {
        if (200..300).contains(&status) {
            return OutcomeStatus::Success;
        }
        if status == 404 && operation == DocumentOperation::Delete {
            return OutcomeStatus::Success;
        }

        let failure = FailureReason::rejected(
            status,
            error_type.map(str::to_string),
            reason.map(str::to_string),
        );

        let retryable = self.retryable_statuses.contains(&status)
            || error_type.is_some_and(|t| self.retryable_error_types.contains(t));

        if retryable {
            OutcomeStatus::RetryableFailure(failure)
        } else {
            OutcomeStatus::FatalFailure(failure)
        }
    }

    /// Classify one decoded bulk item.
    pub fn classify_item(&self, operation: DocumentOperation, item: &BulkItemResult) -> OutcomeStatus {
        self.classify(
            operation,
            item.status,
            item.error_type.as_deref(),
            item.reason.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let policy = StatusPolicy::default();
        assert!(policy.classify(DocumentOperation::Upsert, 200, None, None).is_success());
        assert!(policy.classify(DocumentOperation::Upsert, 201, None, None).is_success());
    }

    #[test]
    fn test_delete_not_found_is_success() {
        let policy = StatusPolicy::default();
        assert!(policy
            .classify(DocumentOperation::Delete, 404, None, Some("not_found"))
            .is_success());
        assert!(matches!(
            policy.classify(DocumentOperation::Upsert, 404, None, None),
            OutcomeStatus::FatalFailure(_)
        ));
    }

    #[test]
    fn test_retryable_statuses() {
        let policy = StatusPolicy::default();
        for status in [408, 409, 429, 502, 503, 504] {
            assert!(
                policy.classify(DocumentOperation::Upsert, status, None, None).is_retryable(),
                "status {} should be retryable",
                status
            );
        }
    }

    #[test]
    fn test_retryable_error_type_overrides_status() {
        let policy = StatusPolicy::default();
        let status = policy.classify(
            DocumentOperation::Upsert,
            500,
            Some("es_rejected_execution_exception"),
            Some("queue full"),
        );
        assert!(status.is_retryable());
    }

    #[test]
    fn test_mapping_error_is_fatal() {
        let policy = StatusPolicy::default();
        let status = policy.classify(
            DocumentOperation::Upsert,
            400,
            Some("mapper_parsing_exception"),
            Some("failed to parse"),
        );
        assert_eq!(
            status,
            OutcomeStatus::FatalFailure(FailureReason::rejected(
                400,
                Some("mapper_parsing_exception".to_string()),
                Some("failed to parse".to_string()),
            ))
        );
    }

    #[test]
    fn test_unknown_status_is_fatal() {
        let policy = StatusPolicy::default();
        assert!(matches!(
            policy.classify(DocumentOperation::Upsert, 799, None, None),
            OutcomeStatus::FatalFailure(_)
        ));
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: StatusPolicy =
            serde_json::from_str(r#"{"retryable_statuses": [429]}"#).unwrap();
        assert_eq!(policy.retryable_statuses.len(), 1);
        assert!(!policy.retryable_error_types.is_empty());
        assert!(matches!(
            policy.classify(DocumentOperation::Upsert, 409, None, None),
            OutcomeStatus::FatalFailure(_)
        ));
    }
}
