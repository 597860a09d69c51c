//! Audio DMA driver contract.
//!
//! The capture core drives one hardware DMA channel per instance through the
//! [`DmaEngine`] trait. The driver behind it owns the register interface; this
//! crate only fixes the call shapes and the error taxonomy.
//!
//! Completion flows the other way: the driver's interrupt handler calls
//! [`DmaCompletionHandler::dma_complete`] with a raw hardware result code.
//! That path runs in ISR context and must never block, so the handler side
//! (the capture pool) classifies the code with [`DmaIntCode::from_hw_code`]
//! and forwards it through a non-blocking channel send.

use thiserror_no_std::Error;

/// Identifier of one hardware DMA channel, assigned by the driver when a
/// signal path is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaChannelId(u8);

impl DmaChannelId {
    /// Wrap a raw channel number.
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// The raw channel number.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Signal path a DMA channel can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaPath {
    /// Microphone front end to memory.
    MicToMemory,
    /// I2S input port 0 to memory.
    I2s0ToMemory,
}

/// On-the-wire sample format of a DMA transfer.
///
/// 24-bit and 32-bit capture both run the engine in its 24-bit mode; the
/// distinction only affects how the caller unpacks the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFormat {
    /// 16 bits per sample, 2 bytes per channel slot.
    Bits16,
    /// 24 bits per sample, 4 bytes per channel slot.
    Bits24,
}

/// How a running transfer is wound down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopMode {
    /// Let the in-flight request drain, then stop.
    Normal,
    /// Abort at the next sample boundary.
    Immediate,
}

/// Raw hardware result code: transfer completed.
pub const DMA_ECODE_COMPLETE: u32 = 0;
/// Raw hardware result code: bus error during transfer.
pub const DMA_ECODE_BUS_ERROR: u32 = 1;

/// Classified completion code, produced in ISR context from the raw hardware
/// result and carried through the event channel to task context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaIntCode {
    /// Transfer finished normally.
    Complete,
    /// The engine reported a bus fault.
    BusError,
    /// Any other non-success code.
    Error,
}

impl DmaIntCode {
    /// Classify a raw hardware result code.
    ///
    /// Unknown codes collapse to [`DmaIntCode::Error`]; the driver decides the
    /// precise error kind later, on task context, in
    /// [`DmaEngine::notify_complete`].
    #[must_use]
    pub const fn from_hw_code(code: u32) -> Self {
        match code {
            DMA_ECODE_COMPLETE => Self::Complete,
            DMA_ECODE_BUS_ERROR => Self::BusError,
            _ => Self::Error,
        }
    }
}

/// DMA failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// The capture FIFO ran dry before the transfer finished.
    #[error("dma underflow")]
    Underflow,
    /// The capture FIFO overflowed; samples were lost.
    #[error("dma overflow")]
    Overflow,
    /// A transfer parameter was rejected by the engine.
    #[error("bad dma parameter")]
    BadParam,
    /// Bus fault while the engine was mastering the bus.
    #[error("dma bus error")]
    Bus,
    /// Spurious or missing interrupt.
    #[error("dma interrupt error")]
    Interrupt,
    /// The engine refused to start.
    #[error("dma start error")]
    Start,
    /// A read/stop/bind request was rejected.
    #[error("dma request error")]
    Request,
}

/// Whether a [`DmaError`] lets the pipeline keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaErrorSeverity {
    /// Logged and reported; the pipeline continues degraded.
    Recoverable,
    /// Reported to the supervisory layer; the instance needs a restart.
    Fatal,
}

impl DmaError {
    /// Classify this error for the recovery policy.
    ///
    /// Underflow, overflow and parameter errors lose data but leave the
    /// engine usable. Bus, interrupt, start and request errors mean the
    /// hardware state can no longer be trusted.
    #[must_use]
    pub const fn severity(self) -> DmaErrorSeverity {
        match self {
            Self::Underflow | Self::Overflow | Self::BadParam => DmaErrorSeverity::Recoverable,
            Self::Bus | Self::Interrupt | Self::Start | Self::Request => DmaErrorSeverity::Fatal,
        }
    }
}

/// Channel configuration applied once per activation, before the first read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaInitParams {
    /// Target channel.
    pub channel: DmaChannelId,
    /// Number of audio channels multiplexed into the transfer.
    pub channels: u8,
    /// Sample format of the transfer.
    pub format: SampleFormat,
    /// Enable hardware fade-in/fade-out around start/stop.
    pub fade_enable: bool,
}

/// One buffer-transfer request handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaReadRequest {
    /// Target channel.
    pub channel: DmaChannelId,
    /// Physical address of the destination buffer.
    pub address: u32,
    /// Transfer length in samples per audio channel.
    pub sample_count: u32,
}

/// Result of a completed transfer, resolved on task context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaDone {
    /// The engine flagged this transfer as the last of the stream.
    pub end_flag: bool,
}

/// ISR-facing completion hook.
///
/// Implementations must be callable from interrupt context: no blocking, no
/// allocation, no locks a task could hold for an unbounded time.
pub trait DmaCompletionHandler: Sync {
    /// Called by the driver's interrupt handler when a transfer on `channel`
    /// finishes with raw hardware result `result_code`.
    fn dma_complete(&self, channel: DmaChannelId, result_code: u32);
}

/// Register-level audio DMA driver.
///
/// All methods are quick register operations and are only ever called from
/// the single task that owns the channel, so they take `&self` and complete
/// synchronously.
pub trait DmaEngine: Sync {
    /// Bind a hardware channel to `path` and return its id.
    fn get_dma_handle(&self, path: DmaPath) -> Result<DmaChannelId, DmaError>;

    /// Return a previously bound channel to the driver.
    fn free_dma_handle(&self, channel: DmaChannelId) -> Result<(), DmaError>;

    /// Power up the engine behind `channel`.
    fn activate(&self, channel: DmaChannelId) -> Result<(), DmaError>;

    /// Power down the engine behind `channel`.
    fn deactivate(&self, channel: DmaChannelId) -> Result<(), DmaError>;

    /// Apply channel count / sample format / fade configuration.
    fn init(&self, params: &DmaInitParams) -> Result<(), DmaError>;

    /// Register the interrupt completion hook for `channel`.
    ///
    /// The handler outlives the binding, hence `'static`.
    fn register_completion(
        &self,
        channel: DmaChannelId,
        handler: &'static dyn DmaCompletionHandler,
    ) -> Result<(), DmaError>;

    /// Queue one buffer-transfer request.
    ///
    /// The engine pipelines requests; `read` may be called while a transfer
    /// is in flight. It must be called at least once before [`start`].
    ///
    /// [`start`]: DmaEngine::start
    fn read(&self, request: &DmaReadRequest) -> Result<(), DmaError>;

    /// Start the engine. Requires at least one queued read request.
    fn start(&self, channel: DmaChannelId) -> Result<(), DmaError>;

    /// Stop the engine with the given wind-down mode.
    fn stop(&self, channel: DmaChannelId, mode: StopMode) -> Result<(), DmaError>;

    /// Resolve a classified completion code on task context.
    ///
    /// For [`DmaIntCode::Complete`] this acknowledges the interrupt and
    /// returns the transfer result; error codes come back as the precise
    /// [`DmaError`] the hardware recorded.
    fn notify_complete(&self, channel: DmaChannelId, code: DmaIntCode) -> Result<DmaDone, DmaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hw_codes_classify_to_int_codes() {
        assert_eq!(
            DmaIntCode::from_hw_code(DMA_ECODE_COMPLETE),
            DmaIntCode::Complete
        );
        assert_eq!(
            DmaIntCode::from_hw_code(DMA_ECODE_BUS_ERROR),
            DmaIntCode::BusError
        );
        assert_eq!(DmaIntCode::from_hw_code(7), DmaIntCode::Error);
        assert_eq!(DmaIntCode::from_hw_code(u32::MAX), DmaIntCode::Error);
    }

    #[test]
    fn data_loss_errors_are_recoverable() {
        for error in [DmaError::Underflow, DmaError::Overflow, DmaError::BadParam] {
            assert_eq!(error.severity(), DmaErrorSeverity::Recoverable);
        }
    }

    #[test]
    fn hardware_state_errors_are_fatal() {
        for error in [
            DmaError::Bus,
            DmaError::Interrupt,
            DmaError::Start,
            DmaError::Request,
        ] {
            assert_eq!(error.severity(), DmaErrorSeverity::Fatal);
        }
    }
}
