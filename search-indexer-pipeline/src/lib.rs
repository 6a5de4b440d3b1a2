//! # Search Indexer Pipeline
//!
//! This crate turns a stream of source resources into bulk write requests
//! against the search engine and reports a reconciled outcome per run.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Pulls resources from the external source
//! 2. **Processor**: Transforms resources into validated documents
//! 3. **Accumulator**: Groups documents into count/byte-bounded batches
//! 4. **Loader**: Submits batches and classifies per-item outcomes
//! 5. **Retry**: Re-queues retryable documents with backoff
//! 6. **Reconciler**: Aggregates outcomes into the session summary
//! 7. **Orchestrator**: Drives the flow with bounded concurrency

pub mod accumulator;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;
pub mod reconciler;
pub mod retry;

pub use config::PipelineConfig;
pub use errors::{PipelineError, TransformationError};
