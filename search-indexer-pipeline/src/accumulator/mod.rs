//! Batch accumulator.
//!
//! Groups documents, in arrival order, into batches bounded by a document
//! count and a cumulative byte size.

use tracing::{debug, warn};

use search_indexer_shared::{Batch, IndexDocument};

/// Buffers documents until a batch bound is reached.
///
/// A document larger than `max_bytes` on its own is never rejected here; it
/// is emitted alone and the engine decides what to do with it.
#[derive(Debug)]
pub struct BatchAccumulator {
    max_count: usize,
    max_bytes: usize,
    buffer: Vec<IndexDocument>,
    buffered_bytes: usize,
}

impl BatchAccumulator {
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            max_count: max_count.max(1),
            max_bytes: max_bytes.max(1),
            buffer: Vec::new(),
            buffered_bytes: 0,
        }
    }

    /// Add a document.
    ///
    /// Returns the buffered batch when adding `document` would break a bound,
    /// or when `document` itself completes the batch.
    pub fn offer(&mut self, document: IndexDocument) -> Option<Batch> {
        let size = document.size_bytes();
        if size > self.max_bytes {
            warn!(
                document_id = %document.id(),
                size_bytes = size,
                max_batch_bytes = self.max_bytes,
                "Document exceeds the batch byte limit, sending it alone"
            );
        }

        let would_overflow = self.buffer.len() + 1 > self.max_count
            || self.buffered_bytes + size > self.max_bytes;
        let emitted = if !self.buffer.is_empty() && would_overflow {
            self.flush()
        } else {
            None
        };

        self.buffered_bytes += size;
        self.buffer.push(document);

        match emitted {
            Some(batch) => Some(batch),
            None if self.is_full() => self.flush(),
            None => None,
        }
    }

    /// Emit whatever is buffered as a partial batch.
    pub fn flush(&mut self) -> Option<Batch> {
        if self.buffer.is_empty() {
            return None;
        }
        let batch = Batch::new(std::mem::take(&mut self.buffer));
        self.buffered_bytes = 0;
        debug!(
            batch_id = %batch.id(),
            count = batch.len(),
            size_bytes = batch.size_bytes(),
            "Emitting batch"
        );
        Some(batch)
    }

    /// Whether the buffer has reached a bound and should be flushed.
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.max_count || self.buffered_bytes >= self.max_bytes
    }

    /// Take every buffered document without forming a batch.
    pub fn drain(&mut self) -> Vec<IndexDocument> {
        self.buffered_bytes = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }
}
