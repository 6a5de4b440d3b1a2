//! Consumer module for the search indexer pipeline.
//!
//! Pulls resources from an external source and forwards them to the
//! scheduler over a bounded channel.

mod messages;
mod resource_source;

pub use messages::SourceMessage;
pub use resource_source::{spawn_source, ResourceSource, VecResourceSource};
