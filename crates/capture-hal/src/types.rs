//! Caller-facing capture types: input device selection, PCM bit width, and
//! the completion callback surface.

use crate::buffer::BufferHandle;
use crate::dma::{DmaError, DmaPath, SampleFormat};

/// Input device a capture instance records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureDevice {
    /// Analog microphone front end.
    AnalogMic,
    /// Digital (PDM) microphone front end.
    DigitalMic,
    /// External I2S input.
    I2s,
}

impl CaptureDevice {
    /// The DMA signal path this device records through.
    ///
    /// Analog and digital microphones share the mic-to-memory path; the mic
    /// front end multiplexing happens upstream of the DMA engine.
    #[must_use]
    pub const fn dma_path(self) -> DmaPath {
        match self {
            Self::AnalogMic | Self::DigitalMic => DmaPath::MicToMemory,
            Self::I2s => DmaPath::I2s0ToMemory,
        }
    }
}

/// PCM bit width requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitWidth {
    /// 16-bit PCM.
    Bits16,
    /// 24-bit PCM (transferred in 32-bit slots).
    Bits24,
    /// 32-bit PCM (engine runs in 24-bit mode; caller unpacks).
    Bits32,
}

impl BitWidth {
    /// Sample format the DMA engine is configured with.
    #[must_use]
    pub const fn dma_format(self) -> SampleFormat {
        match self {
            Self::Bits16 => SampleFormat::Bits16,
            Self::Bits24 | Self::Bits32 => SampleFormat::Bits24,
        }
    }

    /// Bytes occupied by one sample of one channel in the capture buffer.
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Bits16 => 2,
            Self::Bits24 | Self::Bits32 => 4,
        }
    }
}

/// One captured buffer, as delivered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureBuffer {
    /// Ownership token for the segment holding the samples.
    pub handle: BufferHandle,
    /// Number of samples per channel in the segment.
    pub sample_count: u32,
}

/// Completion payload handed to [`CaptureSink::on_capture_done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureDone {
    /// Device the instance was acquired for.
    pub output_device: CaptureDevice,
    /// The engine flagged this buffer as the last of the stream.
    pub end_flag: bool,
    /// The captured data. Ownership of `buffer.handle` transfers to the sink.
    pub buffer: CaptureBuffer,
}

/// Caller's completion callback surface.
///
/// Both methods are invoked from the capture instance's own task, never from
/// interrupt context, and must not block for long: the instance cannot
/// process its next event until they return.
pub trait CaptureSink: Sync {
    /// One buffer finished capturing. The sink now owns `done.buffer.handle`
    /// and must eventually return it to the buffer pool.
    fn on_capture_done(&self, done: CaptureDone);

    /// The engine reported a DMA error. Recoverable errors (see
    /// [`DmaError::severity`]) leave the pipeline running.
    fn on_capture_error(&self, error: DmaError);
}
