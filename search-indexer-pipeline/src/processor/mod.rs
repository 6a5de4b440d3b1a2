//! Processor module for the search indexer pipeline.
//!
//! Transforms source resources into validated index documents.

mod facets;
mod mapping;
mod resource_processor;

pub use facets::shape_facets;
pub use mapping::{EntityMapping, MappingConfig};
pub use resource_processor::ResourceProcessor;
