//! Documents ready to be written to the search index.

use serde::{Deserialize, Serialize};

/// Write operation carried by an [`IndexDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOperation {
    /// Index-or-replace keyed by id (bulk `index` action).
    Upsert,
    /// Partial update that creates the document when missing
    /// (bulk `update` action with `doc_as_upsert`).
    Merge,
    /// Remove the document (bulk `delete` action, no body).
    Delete,
}

impl DocumentOperation {
    /// Name of the bulk action for this operation.
    pub fn action(&self) -> &'static str {
        match self {
            DocumentOperation::Upsert => "index",
            DocumentOperation::Merge => "update",
            DocumentOperation::Delete => "delete",
        }
    }
}

/// A validated document, immutable once built.
///
/// `id` is stable across re-submissions of the same logical resource, which
/// makes retried writes idempotent. `body` is the serialized JSON source and
/// is treated as opaque bytes downstream of the transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    id: String,
    index: String,
    operation: DocumentOperation,
    body: Vec<u8>,
}

impl IndexDocument {
    /// Build a document with a serialized body.
    ///
    /// Returns `None` when `id` or `index` is empty.
    pub fn new(
        id: impl Into<String>,
        index: impl Into<String>,
        operation: DocumentOperation,
        body: Vec<u8>,
    ) -> Option<Self> {
        let id = id.into();
        let index = index.into();
        if id.is_empty() || index.is_empty() {
            return None;
        }
        Some(Self {
            id,
            index,
            operation,
            body,
        })
    }

    /// Build a delete document.
    pub fn delete(id: impl Into<String>, index: impl Into<String>) -> Option<Self> {
        Self::new(id, index, DocumentOperation::Delete, Vec::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn operation(&self) -> DocumentOperation {
        self.operation
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serialized body size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_identity() {
        assert!(IndexDocument::new("", "idx", DocumentOperation::Upsert, b"{}".to_vec()).is_none());
        assert!(IndexDocument::new("a", "", DocumentOperation::Upsert, b"{}".to_vec()).is_none());
    }

    #[test]
    fn test_delete_has_no_body() {
        let doc = IndexDocument::delete("a", "idx").unwrap();
        assert_eq!(doc.operation(), DocumentOperation::Delete);
        assert_eq!(doc.size_bytes(), 0);
        assert_eq!(doc.operation().action(), "delete");
    }
}
