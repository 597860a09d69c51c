//! Event messages and instance states.
//!
//! Events are passed by value through each instance's private channel and
//! consumed exactly once by the state machine dispatch. Which events are
//! legal in which state is decided by [`dispatch`]; anything not covered is
//! an [`IllegalRequest`].
//!
//! [`dispatch`]: crate::component::CaptureComponent
//! [`IllegalRequest`]: crate::error::CaptureError::IllegalRequest

use capture_hal::{BitWidth, CaptureDevice, CaptureSink, DmaIntCode, DmaPath, MemPoolId, StopMode};

/// Per-instance lifecycle state.
///
/// Activation is a strict progression `Booted → Ready → PreAct → Act`;
/// stopping returns to `Ready`, deactivation to `Booted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Created; no DMA channel bound.
    Booted,
    /// DMA channel bound and activated; accepting configuration and work.
    Ready,
    /// First requests queued; DMA not started until the priming depth is met.
    PreAct,
    /// DMA running; requests pipeline one read per submit.
    Act,
}

/// Discriminant of a [`CaptureEvent`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// Bind and power the DMA channel.
    Activate,
    /// Unbind and power down the DMA channel.
    Deactivate,
    /// Apply channel/format configuration and register callbacks.
    Init,
    /// Submit one buffer-transfer request.
    Run,
    /// Stop the stream.
    Stop,
    /// Hardware completion notification.
    DmaComplete,
}

/// Payload of an Activate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActivateParams {
    /// Signal path to bind.
    pub path: DmaPath,
    /// Device tag reported back in every completion.
    pub output_device: CaptureDevice,
    /// Memory pool capture buffers are drawn from.
    pub mem_pool: MemPoolId,
}

/// Payload of an Init event.
#[derive(Clone, Copy)]
pub struct InitParams {
    /// Number of audio channels to capture.
    pub channels: u8,
    /// PCM bit width.
    pub bit_width: BitWidth,
    /// Caller's completion sink.
    pub sink: &'static dyn CaptureSink,
}

/// Payload of a Run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunParams {
    /// Transfer length in samples per channel.
    pub sample_count: u32,
}

/// Payload of a Stop event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StopParams {
    /// Wind-down mode passed to the DMA engine.
    pub mode: StopMode,
}

/// Tagged event union delivered to a capture instance's task.
#[derive(Clone, Copy)]
pub enum CaptureEvent {
    /// Bind the DMA channel (synchronous; replies through the rendezvous).
    Activate(ActivateParams),
    /// Release the DMA channel (synchronous).
    Deactivate,
    /// Configure the bound channel (fire-and-forget).
    Init(InitParams),
    /// Submit one transfer request (fire-and-forget).
    Run(RunParams),
    /// Stop the stream (synchronous).
    Stop(StopParams),
    /// Completion forwarded from interrupt context.
    DmaComplete(DmaIntCode),
}

impl CaptureEvent {
    /// The event's discriminant, for error reporting.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Activate(_) => EventKind::Activate,
            Self::Deactivate => EventKind::Deactivate,
            Self::Init(_) => EventKind::Init,
            Self::Run(_) => EventKind::Run,
            Self::Stop(_) => EventKind::Stop,
            Self::DmaComplete(_) => EventKind::DmaComplete,
        }
    }
}
