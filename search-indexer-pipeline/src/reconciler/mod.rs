//! Result reconciliation.
//!
//! The [`IndexingSession`] owns all per-run state: counters, the in-flight
//! batch count and the latest outcome of every document. It is mutated only
//! by the scheduler and frozen into a [`SessionSummary`] at the end.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::orchestrator::SchedulerState;
use search_indexer_shared::{FailureReason, ItemOutcome, OutcomeStatus};

/// Why a session stopped before draining.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// External cancellation.
    Cancelled,
    /// The fatal-failure rate went above the configured threshold.
    FatalFailureRate { rate: f64, threshold: f64 },
    /// The session exceeded its wall-clock budget.
    SessionTimeout,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => write!(f, "cancelled"),
            AbortReason::FatalFailureRate { rate, threshold } => write!(
                f,
                "fatal failure rate {:.3} exceeded threshold {:.3}",
                rate, threshold
            ),
            AbortReason::SessionTimeout => write!(f, "session timed out"),
        }
    }
}

/// Terminal state of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    Completed,
    Aborted(AbortReason),
}

/// A document that did not end in success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    pub document_id: String,
    /// `None` for cancelled documents.
    pub reason: Option<FailureReason>,
    pub cancelled: bool,
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.document_id, reason),
            None => write!(f, "{}: cancelled", self.document_id),
        }
    }
}

/// Immutable result of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Distinct documents with a terminal outcome.
    pub total_processed: usize,
    pub succeeded: usize,
    pub fatally_failed: usize,
    pub cancelled: usize,
    /// Every non-success, sorted by document id.
    pub failures: Vec<DocumentFailure>,
    /// Set when the source failed before it was exhausted.
    pub source_error: Option<String>,
}

impl SessionSummary {
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }

    /// Failure entry for a document, if it did not succeed.
    pub fn failure_of(&self, document_id: &str) -> Option<&DocumentFailure> {
        self.failures.iter().find(|f| f.document_id == document_id)
    }
}

/// Live view of a running session, published after every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SchedulerState,
    pub submitted: usize,
    pub succeeded: usize,
    pub fatally_failed: usize,
    pub cancelled: usize,
    pub in_flight_batches: usize,
    pub pending_retries: usize,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            session_id: Uuid::nil(),
            state: SchedulerState::Idle,
            submitted: 0,
            succeeded: 0,
            fatally_failed: 0,
            cancelled: 0,
            in_flight_batches: 0,
            pending_retries: 0,
        }
    }
}

/// Mutable state of one indexing run.
#[derive(Debug)]
pub struct IndexingSession {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    submitted_count: usize,
    succeeded_count: usize,
    fatally_failed_count: usize,
    cancelled_count: usize,
    in_flight_batches: usize,
    outcomes: HashMap<String, ItemOutcome>,
    source_error: Option<String>,
}

impl IndexingSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            submitted_count: 0,
            succeeded_count: 0,
            fatally_failed_count: 0,
            cancelled_count: 0,
            in_flight_batches: 0,
            outcomes: HashMap::new(),
            source_error: None,
        }
    }

    /// A new document entered the pipeline.
    pub fn record_submitted(&mut self) {
        self.submitted_count += 1;
    }

    pub fn batch_dispatched(&mut self) {
        self.in_flight_batches += 1;
    }

    pub fn batch_completed(&mut self) {
        self.in_flight_batches = self.in_flight_batches.saturating_sub(1);
    }

    pub fn record_source_error(&mut self, message: impl Into<String>) {
        self.source_error = Some(message.into());
    }

    /// Store the latest outcome of a document.
    ///
    /// Re-recording a document replaces its previous outcome and moves it
    /// between counters, so every document counts once.
    pub fn record(&mut self, outcome: ItemOutcome) {
        if let Some(previous) = self.outcomes.get(&outcome.document_id) {
            let status = previous.status.clone();
            self.adjust(&status, false);
        }
        self.adjust(&outcome.status, true);
        self.outcomes.insert(outcome.document_id.clone(), outcome);
    }

    fn adjust(&mut self, status: &OutcomeStatus, add: bool) {
        let counter = match status {
            OutcomeStatus::Success => &mut self.succeeded_count,
            OutcomeStatus::FatalFailure(_) => &mut self.fatally_failed_count,
            OutcomeStatus::Cancelled => &mut self.cancelled_count,
            OutcomeStatus::RetryableFailure(_) => return,
        };
        if add {
            *counter += 1;
        } else {
            *counter = counter.saturating_sub(1);
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded_count
    }

    pub fn fatally_failed(&self) -> usize {
        self.fatally_failed_count
    }

    /// `fatal / (succeeded + fatal)`, once at least `min_samples` documents
    /// resolved either way.
    pub fn fatal_failure_rate(&self, min_samples: usize) -> Option<f64> {
        let resolved = self.succeeded_count + self.fatally_failed_count;
        if resolved == 0 || resolved < min_samples {
            return None;
        }
        Some(self.fatally_failed_count as f64 / resolved as f64)
    }

    pub fn snapshot(&self, state: SchedulerState, pending_retries: usize) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            state,
            submitted: self.submitted_count,
            succeeded: self.succeeded_count,
            fatally_failed: self.fatally_failed_count,
            cancelled: self.cancelled_count,
            in_flight_batches: self.in_flight_batches,
            pending_retries,
        }
    }

    /// Freeze the session.
    ///
    /// A document still marked retryable at this point was never resolved
    /// and is reported as cancelled.
    pub fn finalize(self, state: SessionState) -> SessionSummary {
        let mut succeeded = 0;
        let mut fatally_failed = 0;
        let mut cancelled = 0;
        let mut failures = Vec::new();

        for (document_id, outcome) in self.outcomes {
            match outcome.status {
                OutcomeStatus::Success => succeeded += 1,
                OutcomeStatus::FatalFailure(reason) => {
                    fatally_failed += 1;
                    failures.push(DocumentFailure {
                        document_id,
                        reason: Some(reason),
                        cancelled: false,
                    });
                }
                OutcomeStatus::Cancelled | OutcomeStatus::RetryableFailure(_) => {
                    cancelled += 1;
                    failures.push(DocumentFailure {
                        document_id,
                        reason: None,
                        cancelled: true,
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        let summary = SessionSummary {
            session_id: self.session_id,
            state,
            started_at: self.started_at,
            finished_at: Utc::now(),
            total_processed: succeeded + fatally_failed + cancelled,
            succeeded,
            fatally_failed,
            cancelled,
            failures,
            source_error: self.source_error,
        };

        info!(
            session_id = %summary.session_id,
            state = ?summary.state,
            total = summary.total_processed,
            succeeded = summary.succeeded,
            fatally_failed = summary.fatally_failed,
            cancelled = summary.cancelled,
            "Indexing session finished"
        );

        summary
    }
}

impl Default for IndexingSession {
    fn default() -> Self {
        Self::new()
    }
}
