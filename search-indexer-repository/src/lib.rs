//! # Search Indexer Repository
//!
//! This crate provides the write path into the search engine: the transport
//! trait the pipeline depends on, the bulk wire codec, the status
//! classification table, and a concrete implementation for OpenSearch.

pub mod bulk;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;

pub use bulk::{
    compact_body, decode_bulk_response, parse_error_body, BulkItemResult, BulkRequestBody,
    StatusPolicy,
};
pub use config::SearchIndexConfig;
pub use errors::SearchIndexError;
pub use interfaces::{SearchIndexProvider, WireResponse};
pub use opensearch::OpenSearchClient;
