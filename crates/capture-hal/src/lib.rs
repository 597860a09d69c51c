//! Hardware abstraction layer for the audio capture component stack.
//!
//! This crate defines the trait seams between the capture component core and
//! the pieces it does not own:
//!
//! - [`DmaEngine`] — the register-level audio DMA driver (acquire/init/start/
//!   read/stop of a hardware channel).
//! - [`BufferPool`] — the fixed-segment memory allocator that backs capture
//!   transfers.
//! - [`CaptureSink`] — the caller's completion callback surface.
//! - [`DmaCompletionHandler`] — the ISR-facing hook a driver invokes when a
//!   transfer finishes.
//!
//! All traits are object safe and `Sync` so that a single `&'static` driver
//! instance can be shared by every capture task. None of the contracts here
//! allocate; payload types are `Copy`.
//!
//! # Features
//!
//! - `mocks`: compile the [`mocks`] module (recording mock implementations of
//!   every trait) for consumers' host tests.
//! - `defmt`: enable `defmt::Format` derives on all HAL types.

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod dma;
pub mod types;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use buffer::{AllocError, BufferHandle, BufferPool, MemPoolId};
pub use dma::{
    DmaChannelId, DmaCompletionHandler, DmaDone, DmaEngine, DmaError, DmaErrorSeverity,
    DmaInitParams, DmaIntCode, DmaPath, DmaReadRequest, SampleFormat, StopMode,
    DMA_ECODE_BUS_ERROR, DMA_ECODE_COMPLETE,
};
pub use types::{BitWidth, CaptureBuffer, CaptureDevice, CaptureDone, CaptureSink};
