//! The scheduling loop of a single session.
//!
//! All mutable session state (accumulator, retry queue, reconciler) lives
//! here and is touched only from this loop. Spawned tasks do nothing but
//! the wire exchange.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::accumulator::BatchAccumulator;
use crate::config::PipelineConfig;
use crate::consumer::SourceMessage;
use crate::loader::BulkSubmitter;
use crate::orchestrator::SchedulerState;
use crate::processor::ResourceProcessor;
use crate::reconciler::{AbortReason, IndexingSession, SessionSnapshot, SessionState, SessionSummary};
use crate::retry::{RetryCoordinator, RetryPolicy, RetryQueue};
use search_indexer_shared::{Batch, FailureReason, IndexDocument, ItemOutcome, SourceResource};

type Submission = BoxFuture<'static, (Uuid, Result<Vec<ItemOutcome>, JoinError>)>;

pub(crate) struct SessionRunner<'a> {
    processor: &'a ResourceProcessor,
    submitter: Arc<BulkSubmitter>,
    config: &'a PipelineConfig,
    progress: &'a watch::Sender<SessionSnapshot>,
    session: IndexingSession,
    accumulator: BatchAccumulator,
    coordinator: RetryCoordinator,
    retries: RetryQueue,
    ready: VecDeque<Batch>,
    in_flight: FuturesUnordered<Submission>,
    in_flight_batches: HashMap<Uuid, Arc<Batch>>,
    state: SchedulerState,
    abort_reason: Option<AbortReason>,
    source_open: bool,
    /// Start of the current wait on the source; `None` while pulling is paused.
    waiting_since: Option<Instant>,
}

impl<'a> SessionRunner<'a> {
    pub(crate) fn new(
        processor: &'a ResourceProcessor,
        submitter: Arc<BulkSubmitter>,
        config: &'a PipelineConfig,
        progress: &'a watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            processor,
            submitter,
            config,
            progress,
            session: IndexingSession::new(),
            accumulator: BatchAccumulator::new(config.max_batch_count, config.max_batch_bytes),
            coordinator: RetryCoordinator::new(RetryPolicy::from_config(config)),
            retries: RetryQueue::new(),
            ready: VecDeque::new(),
            in_flight: FuturesUnordered::new(),
            in_flight_batches: HashMap::new(),
            state: SchedulerState::Idle,
            abort_reason: None,
            source_open: true,
            waiting_since: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut source: mpsc::Receiver<SourceMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionSummary {
        let session_deadline = self.config.session_timeout().map(|t| Instant::now() + t);
        let mut watching_shutdown = true;

        self.transition(SchedulerState::Streaming);
        if *shutdown.borrow_and_update() {
            self.abort(AbortReason::Cancelled);
        }

        loop {
            self.dispatch_ready();

            match self.state {
                SchedulerState::Streaming if !self.source_open => {
                    self.start_draining();
                    continue;
                }
                SchedulerState::Draining if self.is_settled() => {
                    self.transition(SchedulerState::Completed);
                    break;
                }
                SchedulerState::Aborted if self.in_flight.is_empty() => break,
                _ => {}
            }

            self.publish();

            let aborted = self.state == SchedulerState::Aborted;
            let retry_deadline = if aborted {
                None
            } else {
                self.retries.next_deadline()
            };
            let can_pull = self.state == SchedulerState::Streaming
                && self.ready.is_empty()
                && self.in_flight.len() < self.config.max_concurrent_batches;
            self.waiting_since = if can_pull {
                Some(self.waiting_since.unwrap_or_else(Instant::now))
            } else {
                None
            };
            let idle_deadline = self
                .waiting_since
                .filter(|_| !self.accumulator.is_empty())
                .map(|since| since + self.config.idle_flush_timeout());

            tokio::select! {
                biased;

                changed = shutdown.changed(), if watching_shutdown && !aborted => {
                    match changed {
                        Ok(()) if *shutdown.borrow_and_update() => self.abort(AbortReason::Cancelled),
                        Ok(()) => {}
                        Err(_) => watching_shutdown = false,
                    }
                }
                _ = sleep_until_opt(session_deadline), if session_deadline.is_some() && !aborted => {
                    self.abort(AbortReason::SessionTimeout);
                }
                Some((batch_id, joined)) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.complete_batch(batch_id, joined);
                }
                _ = sleep_until_opt(retry_deadline), if retry_deadline.is_some() => {
                    self.release_due_retries();
                }
                message = source.recv(), if can_pull => {
                    self.handle_source(message);
                }
                _ = sleep_until_opt(idle_deadline), if idle_deadline.is_some() => {
                    self.flush_idle();
                }
                else => {
                    error!(state = ?self.state, "Scheduler has nothing left to wait on");
                    break;
                }
            }
        }

        if !self.state.is_terminal() {
            self.abort(AbortReason::Cancelled);
        }
        self.publish();

        let state = match self.state {
            SchedulerState::Aborted => {
                SessionState::Aborted(self.abort_reason.take().unwrap_or(AbortReason::Cancelled))
            }
            _ => SessionState::Completed,
        };
        self.session.finalize(state)
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!(from = ?self.state, to = ?next, "Scheduler transition");
        self.state = next;
    }

    fn publish(&self) {
        self.progress
            .send_replace(self.session.snapshot(self.state, self.retries.len()));
    }

    fn is_settled(&self) -> bool {
        self.in_flight.is_empty()
            && self.ready.is_empty()
            && self.retries.is_empty()
            && self.accumulator.is_empty()
    }

    fn handle_source(&mut self, message: Option<SourceMessage>) {
        self.waiting_since = None;
        match message {
            Some(SourceMessage::Resource(resource)) => self.ingest(resource),
            Some(SourceMessage::Error(message)) => {
                warn!(error = %message, "Source failed, draining what was read");
                self.session.record_source_error(message);
                self.source_open = false;
            }
            Some(SourceMessage::End) | None => {
                self.source_open = false;
            }
        }
    }

    fn ingest(&mut self, resource: SourceResource) {
        match self.processor.process(&resource) {
            Ok(Some(document)) => {
                self.session.record_submitted();
                self.offer(document);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(resource_id = %resource.resource_id, error = %e, "Resource cannot be transformed");
                self.session.record_submitted();
                self.session.record(ItemOutcome::fatal(
                    resource.resource_id,
                    FailureReason::transformation(e.to_string()),
                ));
                self.check_fatal_rate();
            }
        }
    }

    fn offer(&mut self, document: IndexDocument) {
        if let Some(batch) = self.accumulator.offer(document) {
            self.ready.push_back(batch);
        }
        if self.accumulator.is_full() {
            self.ready.extend(self.accumulator.flush());
        }
    }

    fn flush_idle(&mut self) {
        if let Some(batch) = self.accumulator.flush() {
            debug!(count = batch.len(), "Idle timeout, flushing partial batch");
            self.ready.push_back(batch);
        }
    }

    fn start_draining(&mut self) {
        info!(
            pending_retries = self.retries.len(),
            in_flight = self.in_flight.len(),
            "Source exhausted, draining"
        );
        self.transition(SchedulerState::Draining);
        self.ready.extend(self.accumulator.flush());
    }

    /// Start submissions for ready batches while there is capacity.
    fn dispatch_ready(&mut self) {
        if !matches!(self.state, SchedulerState::Streaming | SchedulerState::Draining) {
            return;
        }
        while self.in_flight.len() < self.config.max_concurrent_batches {
            let Some(batch) = self.ready.pop_front() else {
                break;
            };
            let batch = Arc::new(batch);
            let batch_id = batch.id();

            let submitter = Arc::clone(&self.submitter);
            let task_batch = Arc::clone(&batch);
            let handle = tokio::spawn(async move { submitter.submit(&task_batch).await });
            self.in_flight
                .push(async move { (batch_id, handle.await) }.boxed());

            debug!(
                batch_id = %batch_id,
                count = batch.len(),
                size_bytes = batch.size_bytes(),
                in_flight = self.in_flight.len(),
                "Dispatched batch"
            );
            self.in_flight_batches.insert(batch_id, batch);
            self.session.batch_dispatched();
        }
    }

    fn complete_batch(&mut self, batch_id: Uuid, joined: Result<Vec<ItemOutcome>, JoinError>) {
        self.session.batch_completed();
        let Some(batch) = self.in_flight_batches.remove(&batch_id) else {
            error!(batch_id = %batch_id, "Completed batch is not tracked");
            return;
        };

        let outcomes = joined.unwrap_or_else(|e| {
            error!(batch_id = %batch_id, error = %e, "Submission task failed");
            batch
                .documents()
                .iter()
                .map(|doc| {
                    ItemOutcome::retryable(
                        doc.id(),
                        FailureReason::transport(format!("submission task failed: {}", e)),
                    )
                })
                .collect()
        });

        if self.state == SchedulerState::Aborted {
            for outcome in outcomes {
                if outcome.status.is_retryable() {
                    self.coordinator.forget(&outcome.document_id);
                    self.session.record(ItemOutcome::cancelled(outcome.document_id));
                } else {
                    self.session.record(outcome);
                }
            }
            return;
        }

        let plan = self.coordinator.partition(&batch, outcomes);
        for outcome in plan.to_report {
            self.session.record(outcome);
        }
        let now = Instant::now();
        for retry in plan.to_retry {
            self.session.record(ItemOutcome::retryable(
                retry.document.id(),
                retry.last_failure.clone(),
            ));
            self.retries.schedule(retry, now);
        }

        self.check_fatal_rate();
    }

    fn release_due_retries(&mut self) {
        let due = self.retries.pop_due(Instant::now());
        debug!(count = due.len(), "Releasing retries");
        for document in due {
            self.offer(document);
        }
        if self.state == SchedulerState::Draining {
            self.ready.extend(self.accumulator.flush());
        }
    }

    fn check_fatal_rate(&mut self) {
        let Some(threshold) = self.config.fatal_failure_rate_threshold else {
            return;
        };
        if let Some(rate) = self
            .session
            .fatal_failure_rate(self.config.fatal_failure_min_samples)
        {
            if rate > threshold {
                self.abort(AbortReason::FatalFailureRate { rate, threshold });
            }
        }
    }

    /// Stop admitting work and cancel everything not yet on the wire.
    fn abort(&mut self, reason: AbortReason) {
        if self.state.is_terminal() {
            return;
        }
        warn!(
            reason = %reason,
            in_flight = self.in_flight.len(),
            "Aborting indexing session"
        );

        let pending: Vec<IndexDocument> = self
            .accumulator
            .drain()
            .into_iter()
            .chain(self.ready.drain(..).flat_map(Batch::into_documents))
            .chain(self.retries.drain())
            .collect();
        for document in pending {
            self.coordinator.forget(document.id());
            self.session.record(ItemOutcome::cancelled(document.id()));
        }

        self.source_open = false;
        self.abort_reason = Some(reason);
        self.transition(SchedulerState::Aborted);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
