//! Accumulation buffer deferring sink writes.

/// Separator appended after every record so batch boundaries never
/// concatenate two records.
pub(crate) const LINE_SEPARATOR: u8 = b'\n';

/// Byte buffer that concatenates decoded payloads until a threshold is
/// crossed.
///
/// Owned exclusively by the event-loop thread; no locking. The counter tracks
/// the sum of payload lengths appended since the last flush (separators are
/// excluded, matching the threshold semantics of the wire payloads), and both
/// buffer and counter reset together when the batch is taken.
pub(crate) struct BatchBuffer {
    bytes: Vec<u8>,
    accumulated: usize,
    capacity: usize,
}

impl BatchBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::new(),
            accumulated: 0,
            capacity,
        }
    }

    /// Append one payload plus its record separator.
    ///
    /// Returns `true` when the accumulated payload length has reached the
    /// flush threshold.
    pub(crate) fn push(&mut self, payload: &[u8]) -> bool {
        self.bytes.extend_from_slice(payload);
        self.bytes.push(LINE_SEPARATOR);
        self.accumulated += payload.len();
        self.accumulated >= self.capacity
    }

    /// Take the buffered bytes, resetting the buffer and counter.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        self.accumulated = 0;
        std::mem::take(&mut self.bytes)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }
}
