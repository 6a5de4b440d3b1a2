//! Ordered groups of documents submitted in one wire exchange.

use uuid::Uuid;

use crate::IndexDocument;

/// An ordered, bounded sequence of documents.
///
/// The accumulator enforces the count and byte bounds; a `Batch` only records
/// what it holds.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    documents: Vec<IndexDocument>,
    size_bytes: usize,
}

impl Batch {
    /// Wrap documents into a batch with a fresh id.
    pub fn new(documents: Vec<IndexDocument>) -> Self {
        let size_bytes = documents.iter().map(IndexDocument::size_bytes).sum();
        Self {
            id: Uuid::new_v4(),
            documents,
            size_bytes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn documents(&self) -> &[IndexDocument] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<IndexDocument> {
        self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Sum of the documents' body sizes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentOperation;

    #[test]
    fn test_size_is_sum_of_bodies() {
        let docs = vec![
            IndexDocument::new("a", "idx", DocumentOperation::Upsert, vec![0; 10]).unwrap(),
            IndexDocument::new("b", "idx", DocumentOperation::Upsert, vec![0; 5]).unwrap(),
        ];
        let batch = Batch::new(docs);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_bytes(), 15);
        assert_eq!(batch.documents()[1].id(), "b");
    }
}
