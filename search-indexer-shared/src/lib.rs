//! # Search Indexer Shared
//!
//! Data model shared by the repository and pipeline crates: the resources that
//! enter the pipeline, the documents and batches that leave it, and the
//! per-document outcomes reported back.

mod batch;
mod document;
mod outcome;
mod resource;

pub use batch::Batch;
pub use document::{DocumentOperation, IndexDocument};
pub use outcome::{FailureReason, ItemOutcome, OutcomeStatus};
pub use resource::{FacetResultSet, SourceResource};
