//! Orchestrator module for the search indexer pipeline.
//!
//! Coordinates the source, processor, accumulator, loader and retry
//! components for one indexing session at a time.

mod runner;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::consumer::{spawn_source, ResourceSource};
use crate::errors::PipelineError;
use crate::loader::BulkSubmitter;
use crate::processor::ResourceProcessor;
use crate::reconciler::{SessionSnapshot, SessionSummary};
use runner::SessionRunner;
use search_indexer_shared::{FailureReason, ItemOutcome, SourceResource};

/// Scheduler lifecycle.
///
/// `Idle -> Streaming -> Draining -> Completed`, with `Aborted` reachable
/// from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Streaming,
    Draining,
    Completed,
    Aborted,
}

impl SchedulerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerState::Completed | SchedulerState::Aborted)
    }
}

/// Cancellation and progress channels of one session.
///
/// Clones share the same channels. A control cancelled before its session
/// starts makes that session abort immediately; other sessions on the same
/// orchestrator are unaffected.
#[derive(Debug, Clone)]
pub struct SessionControl {
    shutdown_tx: Arc<watch::Sender<bool>>,
    progress_tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionControl {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (progress_tx, _) = watch::channel(SessionSnapshot::idle());
        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            progress_tx: Arc::new(progress_tx),
        }
    }

    /// Cancel the session.
    ///
    /// In-flight submissions finish; nothing new is dispatched.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Subscribe to live session snapshots.
    pub fn subscribe_progress(&self) -> watch::Receiver<SessionSnapshot> {
        self.progress_tx.subscribe()
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrator that coordinates the pipeline components.
///
/// The orchestrator:
/// - Pulls resources from the source with backpressure
/// - Dispatches batches under the concurrency limit
/// - Feeds retryable documents back after their backoff
/// - Publishes progress and returns the session summary
///
/// Sessions share nothing but the processor and the submitter, so several
/// may run concurrently on one orchestrator.
pub struct Orchestrator {
    processor: ResourceProcessor,
    submitter: Arc<BulkSubmitter>,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Create a new orchestrator, rejecting an unusable configuration.
    pub fn new(
        processor: ResourceProcessor,
        submitter: BulkSubmitter,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        Ok(Self {
            processor,
            submitter: Arc::new(submitter),
            config,
        })
    }

    /// Make sure every mapped index exists.
    ///
    /// With `reset`, each distinct index is dropped and recreated exactly
    /// once, even when several entity types share it.
    #[instrument(skip(self))]
    pub async fn prepare_indices(&self, reset: bool) -> Result<(), PipelineError> {
        for (index, settings) in self.processor.mappings().indices() {
            if reset {
                self.submitter.reset_index(index, settings).await?;
            } else {
                self.submitter.ensure_index(index, settings).await?;
            }
        }
        Ok(())
    }

    /// Check that the search engine is reachable and healthy.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        self.submitter.health_check().await
    }

    /// Run one session to completion or abort.
    ///
    /// Per-document failures never fail the call; they are reported in the
    /// returned summary.
    pub async fn run<S>(&self, source: S) -> SessionSummary
    where
        S: ResourceSource + 'static,
    {
        self.run_with(source, SessionControl::new()).await
    }

    /// Run one session driven by `control`.
    #[instrument(skip(self, source, control))]
    pub async fn run_with<S>(&self, source: S, control: SessionControl) -> SessionSummary
    where
        S: ResourceSource + 'static,
    {
        info!(
            max_batch_count = self.config.max_batch_count,
            max_batch_bytes = self.config.max_batch_bytes,
            max_concurrent_batches = self.config.max_concurrent_batches,
            "Starting indexing session"
        );

        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        let producer = spawn_source(source, tx);

        let runner = SessionRunner::new(
            &self.processor,
            Arc::clone(&self.submitter),
            &self.config,
            &control.progress_tx,
        );
        let summary = runner.run(rx, control.shutdown_tx.subscribe()).await;

        producer.abort();
        summary
    }

    /// Transform one resource and write it through the single-document path.
    ///
    /// Returns `None` when the resource carries nothing to index.
    #[instrument(skip(self, resource), fields(resource_id = %resource.resource_id))]
    pub async fn index_one(&self, resource: &SourceResource) -> Option<ItemOutcome> {
        match self.processor.process(resource) {
            Ok(Some(document)) => Some(self.submitter.submit_one(&document).await),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Resource cannot be transformed");
                Some(ItemOutcome::fatal(
                    resource.resource_id.clone(),
                    FailureReason::transformation(e.to_string()),
                ))
            }
        }
    }
}
