//! Bounded request FIFO.
//!
//! Holds the in-flight transfer requests of one instance, in issue order.
//! Pushed when a read is handed to the DMA engine, popped when the matching
//! completion is delivered to the caller. Owned exclusively by the instance
//! task; no synchronization needed.

use capture_hal::BufferHandle;
use heapless::Deque;

use crate::error::CaptureError;

/// One in-flight or pending buffer-transfer request.
///
/// Exclusively owns `buffer` until the matching completion hands it to the
/// caller's sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureRequest {
    /// Ownership token for the destination segment.
    pub buffer: BufferHandle,
    /// Transfer length in samples per channel.
    pub sample_count: u32,
}

/// Fixed-capacity FIFO of queued items.
#[derive(Debug, Default)]
pub struct RequestQueue<T, const N: usize> {
    items: Deque<T, N>,
}

impl<T, const N: usize> RequestQueue<T, N> {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Deque::new() }
    }

    /// Append an item. Fails with [`CaptureError::QueueFull`] when the queue
    /// is at capacity — backpressure, not a fault.
    pub fn push(&mut self, item: T) -> Result<(), CaptureError> {
        self.items.push_back(item).map_err(|_| CaptureError::QueueFull)
    }

    /// Remove and return the oldest item. Fails with
    /// [`CaptureError::QueuePop`] on an empty queue, which indicates a
    /// producer/consumer protocol violation.
    pub fn pop(&mut self) -> Result<T, CaptureError> {
        self.items.pop_front().ok_or(CaptureError::QueuePop)
    }

    /// The oldest item, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    /// True when no more items fit.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// True when no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }
}
