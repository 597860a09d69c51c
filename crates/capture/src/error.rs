//! Capture error taxonomy.

use capture_hal::DmaError;
use thiserror_no_std::Error;

use crate::event::{EventKind, State};

/// Errors surfaced by the capture component and its caller API.
///
/// Backpressure conditions (`ResourceExhausted`, `QueueFull`) are expected
/// under load and must be handled by retrying or dropping. `QueuePop` and
/// `QueueMissing` indicate a protocol violation between producer and consumer
/// and are reported to the supervisory layer rather than asserted fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureError {
    /// Every instance slot is already bound.
    #[error("no free capture instance")]
    ResourceExhausted,
    /// Handle out of range, or not currently bound.
    #[error("invalid capture handle")]
    InvalidHandle,
    /// The event is not legal in the instance's current state.
    #[error("illegal request: {event:?} in state {state:?}")]
    IllegalRequest {
        /// The rejected event.
        event: EventKind,
        /// The state the instance was in.
        state: State,
    },
    /// A bounded queue rejected a push; backpressure, retry or drop.
    #[error("capture queue full")]
    QueueFull,
    /// Pop from an empty queue; producer/consumer protocol violation.
    #[error("capture queue pop underflow")]
    QueuePop,
    /// A completion arrived with no in-flight request queued.
    #[error("completion without queued request")]
    QueueMissing,
    /// A synchronous command (activate/deactivate/stop) was rejected by the
    /// instance task.
    #[error("capture command failed")]
    CommandFailed,
    /// The instance received work before a sink was configured.
    #[error("capture instance not configured")]
    NotConfigured,
    /// Capture buffer allocation failed; the request was dropped and the
    /// pipeline continues degraded.
    #[error("capture buffer allocation failed")]
    Allocation,
    /// The DMA driver reported an error.
    #[error("dma failure: {0}")]
    Dma(DmaError),
}
