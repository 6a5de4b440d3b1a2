//! Bulk wire protocol support.
//!
//! Encoding of documents into newline-delimited action/body pairs, decoding
//! of the positional per-item result array, and the table that classifies
//! native status codes into retryable or fatal outcomes.

mod classification;
mod codec;

pub use classification::StatusPolicy;
pub use codec::{
    compact_body, decode_bulk_response, parse_error_body, BulkItemResult, BulkRequestBody,
};
