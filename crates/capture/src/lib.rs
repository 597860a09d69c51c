//! Audio capture component: a fixed pool of event-driven capture instances.
//!
//! Each instance owns one hardware DMA channel and runs a four-state machine
//! (`Booted → Ready → PreAct → Act`) on its own task. Callers drive it through
//! the [`CapturePool`] API; DMA completions are forwarded from interrupt
//! context through the pool's [`DmaCompletionHandler`] implementation.
//!
//! # Architecture
//!
//! ```text
//! caller task ──acquire/configure/submit/stop──► CapturePool
//!                                                   │ per-slot event channel
//!                                                   ▼
//!                                          CaptureComponent::run()
//!                                          (state machine, one task each)
//!                                                   ▲
//! DMA ISR ──dma_complete(channel, code)── CapturePool (lock-free lookup)
//! ```
//!
//! Commands come in two flavors. Activate, deactivate and stop are
//! synchronous: the caller awaits a rendezvous reply from the instance task.
//! Init and run are fire-and-forget: a full event queue is backpressure
//! ([`CaptureError::QueueFull`]) and the caller retries or drops.
//!
//! The hardware seams — DMA driver, buffer allocator, completion sink — are
//! the `capture-hal` traits; host tests run the full pipeline against that
//! crate's mocks.
//!
//! # Features
//!
//! - `hardware`: compile the [`task`] module (`embassy-executor` task
//!   wrapper) for on-target builds.
//! - `defmt`: enable `defmt::Format` derives and instance-task logging.
//!
//! [`DmaCompletionHandler`]: capture_hal::DmaCompletionHandler

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod component;
pub mod error;
pub mod event;
pub mod pool;
pub mod queue;

#[cfg(feature = "hardware")]
pub mod task;

pub use component::{CaptureComponent, PRIMING_DEPTH, REQUEST_QUEUE_DEPTH};
pub use error::CaptureError;
pub use event::{
    ActivateParams, CaptureEvent, EventKind, InitParams, RunParams, State, StopParams,
};
pub use pool::{CaptureHandle, CapturePool, EVENT_QUEUE_DEPTH, MAX_CAPTURE_INSTANCES};
pub use queue::{CaptureRequest, RequestQueue};
