//! Message types passed from the source task to the scheduler.

use search_indexer_shared::SourceResource;

/// Messages sent through the source channel.
#[derive(Debug, Clone)]
pub enum SourceMessage {
    /// A resource to transform and index.
    Resource(SourceResource),
    /// The source failed and will produce nothing more.
    Error(String),
    /// The source is exhausted.
    End,
}
