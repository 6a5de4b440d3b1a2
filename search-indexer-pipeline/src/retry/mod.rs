//! Retry coordination.
//!
//! Splits a batch's outcomes into what is reported now and what is tried
//! again later, tracks attempts per document, and holds delayed documents
//! until their backoff expires.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use search_indexer_shared::{Batch, FailureReason, IndexDocument, ItemOutcome, OutcomeStatus};

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Relative jitter, e.g. `0.1` for ±10%.
    pub jitter: f64,
    /// Retries allowed after the first submission.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter: config.retry_jitter,
            max_attempts: config.max_attempts,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `base * 2^(retry - 1)`, capped at `max_delay`, then jittered and
    /// clamped back into `[base_delay, max_delay]`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * f64::from(1u32 << exponent)).min(max_ms);

        let jittered = if self.jitter > 0.0 {
            let factor = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
            delay_ms * (1.0 + factor)
        } else {
            delay_ms
        };

        Duration::from_millis(jittered.clamp(base_ms, max_ms) as u64)
    }
}

/// A document waiting for another attempt.
#[derive(Debug, Clone)]
pub struct ScheduledRetry {
    pub document: IndexDocument,
    /// Retry number this submission will be (1 for the first retry).
    pub attempt: u32,
    pub delay: Duration,
    pub last_failure: FailureReason,
}

/// Result of partitioning one batch's outcomes.
#[derive(Debug, Default)]
pub struct RetryPlan {
    /// Terminal outcomes, ready for the reconciler.
    pub to_report: Vec<ItemOutcome>,
    /// Documents to submit again after their delay.
    pub to_retry: Vec<ScheduledRetry>,
}

/// Tracks retries per document across the whole session.
#[derive(Debug)]
pub struct RetryCoordinator {
    policy: RetryPolicy,
    retries: HashMap<String, u32>,
}

impl RetryCoordinator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retries: HashMap::new(),
        }
    }

    /// Retries already scheduled for a document.
    pub fn retries_of(&self, document_id: &str) -> u32 {
        self.retries.get(document_id).copied().unwrap_or(0)
    }

    /// Partition the outcomes of `batch`, correlated by position.
    ///
    /// Retried documents are the original documents from the batch, never
    /// re-transformed. A document past its retry budget is reported as
    /// `RetriesExhausted`.
    pub fn partition(&mut self, batch: &Batch, outcomes: Vec<ItemOutcome>) -> RetryPlan {
        let documents = batch.documents();
        if outcomes.len() != documents.len() {
            warn!(
                batch_id = %batch.id(),
                documents = documents.len(),
                outcomes = outcomes.len(),
                "Outcome count does not match batch size"
            );
        }

        let mut plan = RetryPlan::default();
        let mut outcomes = outcomes.into_iter();

        for document in documents {
            let outcome = outcomes.next().unwrap_or_else(|| {
                ItemOutcome::fatal(
                    document.id(),
                    FailureReason::protocol_violation("no outcome for document"),
                )
            });

            let reason = match outcome.status {
                OutcomeStatus::RetryableFailure(reason) => reason,
                status => {
                    self.retries.remove(document.id());
                    plan.to_report.push(ItemOutcome::new(document.id(), status));
                    continue;
                }
            };

            let done = self.retries_of(document.id());
            if done >= self.policy.max_attempts {
                self.retries.remove(document.id());
                warn!(document_id = %document.id(), attempts = done + 1, "Retries exhausted");
                plan.to_report.push(ItemOutcome::fatal(
                    document.id(),
                    FailureReason::RetriesExhausted {
                        attempts: done + 1,
                        last: Box::new(reason),
                    },
                ));
                continue;
            }

            let attempt = done + 1;
            self.retries.insert(document.id().to_string(), attempt);
            let delay = self.policy.backoff(attempt);
            debug!(
                document_id = %document.id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %reason,
                "Scheduling retry"
            );
            plan.to_retry.push(ScheduledRetry {
                document: document.clone(),
                attempt,
                delay,
                last_failure: reason,
            });
        }

        plan
    }

    /// Drop the retry history of a document.
    pub fn forget(&mut self, document_id: &str) {
        self.retries.remove(document_id);
    }
}

#[derive(Debug)]
struct QueuedRetry {
    ready_at: Instant,
    seq: u64,
    document: IndexDocument,
}

impl PartialEq for QueuedRetry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedRetry {}

impl PartialOrd for QueuedRetry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRetry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ready_at
            .cmp(&other.ready_at)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Documents waiting out their backoff, ordered by deadline.
#[derive(Debug, Default)]
pub struct RetryQueue {
    heap: BinaryHeap<Reverse<QueuedRetry>>,
    seq: u64,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, retry: ScheduledRetry, now: Instant) {
        self.seq += 1;
        self.heap.push(Reverse(QueuedRetry {
            ready_at: now + retry.delay,
            seq: self.seq,
            document: retry.document,
        }));
    }

    /// Earliest deadline among queued documents.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.ready_at)
    }

    /// Remove every document whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Vec<IndexDocument> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(entry)| entry.ready_at <= now)
        {
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry.document);
            }
        }
        due
    }

    /// Remove everything regardless of deadline.
    pub fn drain(&mut self) -> Vec<IndexDocument> {
        self.heap
            .drain()
            .map(|Reverse(entry)| entry.document)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
