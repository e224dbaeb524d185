//! Fixed-capacity accumulator with an explicit partition boundary

/// Collects items and hands back full chunks
///
/// `push` returns a chunk as soon as `capacity` items are held.
/// `flush_remainder` returns whatever is left and must be called once at the
/// end of every partition.
#[derive(Debug)]
pub struct Chunker<T> {
    capacity: usize,
    buffer: Vec<T>,
}

impl<T> Chunker<T> {
    /// Create a chunker; a zero capacity is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently held
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Add an item, returning a full chunk when capacity is reached
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.buffer.push(item);
        if self.buffer.len() >= self.capacity {
            Some(self.take())
        } else {
            None
        }
    }

    /// Return the partial chunk, if any
    pub fn flush_remainder(&mut self) -> Option<Vec<T>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity))
    }
}
