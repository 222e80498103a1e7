//! Audio buffer queue
//!
//! FIFO of decoded chunks waiting for the sink, with at most one append in
//! flight. The player calls [`AudioBufferQueue::next_ready`] whenever the
//! queue or the sink may have changed; it yields a chunk only when nothing is
//! being appended.

use std::collections::VecDeque;

/// Pending audio chunks plus the in-flight marker
#[derive(Debug, Default)]
pub struct AudioBufferQueue {
    pending: VecDeque<Vec<u8>>,
    in_flight: bool,
}

impl AudioBufferQueue {
    /// Empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk at the back
    pub fn enqueue(&mut self, chunk: Vec<u8>) {
        self.pending.push_back(chunk);
    }

    /// Pop the next chunk if an append may start now
    ///
    /// Returns `None` while an append is in flight, while the sink reports
    /// itself busy, or when nothing is pending. A returned chunk marks the
    /// queue in flight until [`AudioBufferQueue::complete`] is called.
    pub fn next_ready(&mut self, sink_busy: bool) -> Option<Vec<u8>> {
        if self.in_flight || sink_busy {
            return None;
        }
        let chunk = self.pending.pop_front()?;
        self.in_flight = true;
        Some(chunk)
    }

    /// The in-flight append finished (successfully or not)
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    /// Whether an append is in flight
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether nothing is pending or in flight
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && !self.in_flight
    }

    /// Pending chunk count
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything pending and forget the in-flight append
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight = false;
    }
}
