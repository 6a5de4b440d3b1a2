//! Per-document results of a submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a document did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The resource could not be mapped to a document.
    #[error("transformation failed: {message}")]
    Transformation { message: String },

    /// The engine answered with a non-success status for the item.
    #[error("rejected with status {status}{}", describe_rejection(.error_type, .reason))]
    Rejected {
        status: u16,
        error_type: Option<String>,
        reason: Option<String>,
    },

    /// The response did not honour the bulk protocol contract.
    #[error("protocol violation: {message}")]
    ProtocolViolation { message: String },

    /// The request could not be encoded.
    #[error("malformed document: {message}")]
    Malformed { message: String },

    /// The exchange failed before a response arrived.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// No response within the per-submission timeout.
    #[error("submission timed out")]
    Timeout,

    /// A retryable failure persisted past the retry budget.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<FailureReason>,
    },
}

fn describe_rejection(error_type: &Option<String>, reason: &Option<String>) -> String {
    match (error_type, reason) {
        (Some(t), Some(r)) => format!(" ({t}: {r})"),
        (Some(t), None) => format!(" ({t})"),
        (None, Some(r)) => format!(" ({r})"),
        (None, None) => String::new(),
    }
}

impl FailureReason {
    pub fn transformation(msg: impl Into<String>) -> Self {
        Self::Transformation {
            message: msg.into(),
        }
    }

    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: msg.into(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed {
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    pub fn rejected(status: u16, error_type: Option<String>, reason: Option<String>) -> Self {
        Self::Rejected {
            status,
            error_type,
            reason,
        }
    }
}

/// Classification of a single document's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    RetryableFailure(FailureReason),
    FatalFailure(FailureReason),
    /// Pending work discarded after the session aborted.
    Cancelled,
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OutcomeStatus::RetryableFailure(_))
    }

    /// Terminal outcomes are never retried.
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            OutcomeStatus::RetryableFailure(reason) | OutcomeStatus::FatalFailure(reason) => {
                Some(reason)
            }
            OutcomeStatus::Success | OutcomeStatus::Cancelled => None,
        }
    }
}

/// Outcome of one document, positionally correlated with its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub document_id: String,
    pub status: OutcomeStatus,
}

impl ItemOutcome {
    pub fn new(document_id: impl Into<String>, status: OutcomeStatus) -> Self {
        Self {
            document_id: document_id.into(),
            status,
        }
    }

    pub fn success(document_id: impl Into<String>) -> Self {
        Self::new(document_id, OutcomeStatus::Success)
    }

    pub fn retryable(document_id: impl Into<String>, reason: FailureReason) -> Self {
        Self::new(document_id, OutcomeStatus::RetryableFailure(reason))
    }

    pub fn fatal(document_id: impl Into<String>, reason: FailureReason) -> Self {
        Self::new(document_id, OutcomeStatus::FatalFailure(reason))
    }

    pub fn cancelled(document_id: impl Into<String>) -> Self {
        Self::new(document_id, OutcomeStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display() {
        let reason = FailureReason::rejected(
            400,
            Some("mapper_parsing_exception".to_string()),
            Some("failed to parse field [age]".to_string()),
        );
        assert_eq!(
            reason.to_string(),
            "rejected with status 400 (mapper_parsing_exception: failed to parse field [age])"
        );
        assert_eq!(
            FailureReason::rejected(503, None, None).to_string(),
            "rejected with status 503"
        );
    }

    #[test]
    fn test_terminal_classification() {
        assert!(OutcomeStatus::Success.is_terminal());
        assert!(OutcomeStatus::Cancelled.is_terminal());
        assert!(OutcomeStatus::FatalFailure(FailureReason::Timeout).is_terminal());
        assert!(!OutcomeStatus::RetryableFailure(FailureReason::Timeout).is_terminal());
    }
}
