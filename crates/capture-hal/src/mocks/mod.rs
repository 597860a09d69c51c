//! Mock implementations for testing.
//!
//! This module provides recording mock implementations of all HAL traits for
//! use in unit and integration tests. Interior state lives behind
//! `embassy_sync::blocking_mutex::Mutex<CriticalSectionRawMutex, RefCell<_>>`
//! so every mock is `Sync` and usable through `&'static` references, exactly
//! like the real drivers.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::buffer::{AllocError, BufferHandle, BufferPool, MemPoolId};
use crate::dma::{
    DmaChannelId, DmaCompletionHandler, DmaDone, DmaEngine, DmaError, DmaInitParams, DmaIntCode,
    DmaPath, DmaReadRequest, SampleFormat, StopMode,
};
use crate::types::{CaptureDone, CaptureSink};

/// Maximum number of driver calls a [`MockDmaEngine`] records.
pub const MOCK_CALL_LOG_DEPTH: usize = 64;

/// One recorded [`DmaEngine`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaCall {
    /// `get_dma_handle(path)` returning `channel`.
    GetHandle(DmaPath, DmaChannelId),
    /// `free_dma_handle(channel)`.
    FreeHandle(DmaChannelId),
    /// `activate(channel)`.
    Activate(DmaChannelId),
    /// `deactivate(channel)`.
    Deactivate(DmaChannelId),
    /// `init` with the applied channel count and format.
    Init(DmaChannelId, u8, SampleFormat),
    /// `register_completion(channel, _)`.
    RegisterCompletion(DmaChannelId),
    /// `read` with the requested sample count.
    Read(DmaChannelId, u32),
    /// `start(channel)`.
    Start(DmaChannelId),
    /// `stop(channel, mode)`.
    Stop(DmaChannelId, StopMode),
    /// `notify_complete(channel, code)`.
    NotifyComplete(DmaChannelId, DmaIntCode),
}

#[derive(Default)]
struct MockDmaState {
    calls: heapless::Vec<DmaCall, MOCK_CALL_LOG_DEPTH>,
    next_channel: u8,
    handler: Option<&'static dyn DmaCompletionHandler>,
    end_next: bool,
    fail_get_handle: bool,
    fail_activate: bool,
    fail_init: bool,
    fail_read: bool,
    fail_start: bool,
    fail_stop: bool,
}

/// Recording mock of the [`DmaEngine`] driver.
///
/// Every call is appended to an internal log for assertions. Failures can be
/// injected per operation; completions are fired manually through the
/// registered handler, simulating the hardware interrupt.
pub struct MockDmaEngine {
    state: Mutex<CriticalSectionRawMutex, RefCell<MockDmaState>>,
}

impl MockDmaEngine {
    /// Create a mock with an empty call log and no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(MockDmaState::default())),
        }
    }

    /// Snapshot of the recorded call log.
    pub fn calls(&self) -> heapless::Vec<DmaCall, MOCK_CALL_LOG_DEPTH> {
        self.state.lock(|cell| cell.borrow().calls.clone())
    }

    /// Number of `read` requests issued so far.
    pub fn read_count(&self) -> usize {
        self.count(|call| matches!(call, DmaCall::Read(..)))
    }

    /// Number of `start` commands issued so far.
    pub fn start_count(&self) -> usize {
        self.count(|call| matches!(call, DmaCall::Start(..)))
    }

    /// Number of `stop` commands issued so far.
    pub fn stop_count(&self) -> usize {
        self.count(|call| matches!(call, DmaCall::Stop(..)))
    }

    /// Whether a completion handler has been registered.
    pub fn handler_registered(&self) -> bool {
        self.state.lock(|cell| cell.borrow().handler.is_some())
    }

    /// Mark the next completed transfer as end-of-stream.
    pub fn script_end_of_stream(&self) {
        self.state.lock(|cell| cell.borrow_mut().end_next = true);
    }

    /// Make `get_dma_handle` fail with [`DmaError::Request`].
    pub fn fail_get_handle(&self) {
        self.state.lock(|cell| cell.borrow_mut().fail_get_handle = true);
    }

    /// Make `activate` fail with [`DmaError::Request`].
    pub fn fail_activate(&self) {
        self.state.lock(|cell| cell.borrow_mut().fail_activate = true);
    }

    /// Make `init` fail with [`DmaError::BadParam`].
    pub fn fail_init(&self) {
        self.state.lock(|cell| cell.borrow_mut().fail_init = true);
    }

    /// Make `read` fail with [`DmaError::Request`].
    pub fn fail_read(&self) {
        self.state.lock(|cell| cell.borrow_mut().fail_read = true);
    }

    /// Make `start` fail with [`DmaError::Start`].
    pub fn fail_start(&self) {
        self.state.lock(|cell| cell.borrow_mut().fail_start = true);
    }

    /// Make `stop` fail with [`DmaError::Request`].
    pub fn fail_stop(&self) {
        self.state.lock(|cell| cell.borrow_mut().fail_stop = true);
    }

    /// Simulate the hardware completion interrupt for `channel`.
    ///
    /// Invokes the registered [`DmaCompletionHandler`] with the raw result
    /// code, exactly as the driver's ISR would. Does nothing if no handler
    /// has been registered.
    pub fn fire_completion(&self, channel: DmaChannelId, result_code: u32) {
        let handler = self.state.lock(|cell| cell.borrow().handler);
        if let Some(handler) = handler {
            handler.dma_complete(channel, result_code);
        }
    }

    fn count(&self, matcher: impl Fn(&DmaCall) -> bool) -> usize {
        self.state
            .lock(|cell| cell.borrow().calls.iter().filter(|call| matcher(call)).count())
    }

    fn record(&self, call: DmaCall) {
        self.state.lock(|cell| {
            // Log full — drop the call rather than panic; tests never get close.
            let _ = cell.borrow_mut().calls.push(call);
        });
    }
}

impl Default for MockDmaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaEngine for MockDmaEngine {
    fn get_dma_handle(&self, path: DmaPath) -> Result<DmaChannelId, DmaError> {
        let channel = self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            if state.fail_get_handle {
                return Err(DmaError::Request);
            }
            let channel = DmaChannelId::new(state.next_channel);
            state.next_channel = state.next_channel.wrapping_add(1);
            Ok(channel)
        })?;
        self.record(DmaCall::GetHandle(path, channel));
        Ok(channel)
    }

    fn free_dma_handle(&self, channel: DmaChannelId) -> Result<(), DmaError> {
        self.record(DmaCall::FreeHandle(channel));
        Ok(())
    }

    fn activate(&self, channel: DmaChannelId) -> Result<(), DmaError> {
        if self.state.lock(|cell| cell.borrow().fail_activate) {
            return Err(DmaError::Request);
        }
        self.record(DmaCall::Activate(channel));
        Ok(())
    }

    fn deactivate(&self, channel: DmaChannelId) -> Result<(), DmaError> {
        self.record(DmaCall::Deactivate(channel));
        Ok(())
    }

    fn init(&self, params: &DmaInitParams) -> Result<(), DmaError> {
        if self.state.lock(|cell| cell.borrow().fail_init) {
            return Err(DmaError::BadParam);
        }
        self.record(DmaCall::Init(params.channel, params.channels, params.format));
        Ok(())
    }

    fn register_completion(
        &self,
        channel: DmaChannelId,
        handler: &'static dyn DmaCompletionHandler,
    ) -> Result<(), DmaError> {
        self.state.lock(|cell| cell.borrow_mut().handler = Some(handler));
        self.record(DmaCall::RegisterCompletion(channel));
        Ok(())
    }

    fn read(&self, request: &DmaReadRequest) -> Result<(), DmaError> {
        if self.state.lock(|cell| cell.borrow().fail_read) {
            return Err(DmaError::Request);
        }
        self.record(DmaCall::Read(request.channel, request.sample_count));
        Ok(())
    }

    fn start(&self, channel: DmaChannelId) -> Result<(), DmaError> {
        if self.state.lock(|cell| cell.borrow().fail_start) {
            return Err(DmaError::Start);
        }
        self.record(DmaCall::Start(channel));
        Ok(())
    }

    fn stop(&self, channel: DmaChannelId, mode: StopMode) -> Result<(), DmaError> {
        if self.state.lock(|cell| cell.borrow().fail_stop) {
            return Err(DmaError::Request);
        }
        self.record(DmaCall::Stop(channel, mode));
        Ok(())
    }

    fn notify_complete(&self, channel: DmaChannelId, code: DmaIntCode) -> Result<DmaDone, DmaError> {
        self.record(DmaCall::NotifyComplete(channel, code));
        match code {
            DmaIntCode::Complete => {
                let end_flag = self.state.lock(|cell| {
                    let mut state = cell.borrow_mut();
                    core::mem::take(&mut state.end_next)
                });
                Ok(DmaDone { end_flag })
            }
            DmaIntCode::BusError => Err(DmaError::Bus),
            DmaIntCode::Error => Err(DmaError::Overflow),
        }
    }
}

struct MockPoolState {
    live: usize,
    total_allocs: usize,
    next_address: u32,
    fail_all: bool,
}

/// Counting mock of the [`BufferPool`] allocator.
///
/// Hands out synthetic, monotonically increasing addresses and tracks the
/// number of live segments so tests can verify alloc/free balance.
pub struct MockBufferPool {
    capacity: usize,
    state: Mutex<CriticalSectionRawMutex, RefCell<MockPoolState>>,
}

impl MockBufferPool {
    /// Base address of the first synthetic segment.
    pub const BASE_ADDRESS: u32 = 0x0010_0000;

    /// Create a pool with room for `capacity` live segments.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(RefCell::new(MockPoolState {
                live: 0,
                total_allocs: 0,
                next_address: Self::BASE_ADDRESS,
                fail_all: false,
            })),
        }
    }

    /// Make every subsequent allocation fail with [`AllocError::Exhausted`].
    pub fn fail_allocations(&self) {
        self.state.lock(|cell| cell.borrow_mut().fail_all = true);
    }

    /// Number of segments currently allocated and not yet freed.
    pub fn live(&self) -> usize {
        self.state.lock(|cell| cell.borrow().live)
    }

    /// Total number of successful allocations.
    pub fn total_allocs(&self) -> usize {
        self.state.lock(|cell| cell.borrow().total_allocs)
    }
}

impl BufferPool for MockBufferPool {
    fn alloc(&self, pool: MemPoolId, len_bytes: usize) -> Result<BufferHandle, AllocError> {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            if state.fail_all || state.live >= self.capacity {
                return Err(AllocError::Exhausted);
            }
            let address = state.next_address;
            #[allow(clippy::cast_possible_truncation)] // synthetic test addresses
            {
                state.next_address = state.next_address.wrapping_add(len_bytes as u32);
            }
            state.live = state.live.saturating_add(1);
            state.total_allocs = state.total_allocs.saturating_add(1);
            Ok(BufferHandle::new(pool, address, len_bytes))
        })
    }

    fn free(&self, _handle: BufferHandle) {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            state.live = state.live.saturating_sub(1);
        });
    }
}

/// Maximum number of deliveries a [`RecordingSink`] retains.
pub const SINK_LOG_DEPTH: usize = 32;

#[derive(Default)]
struct SinkState {
    dones: heapless::Vec<CaptureDone, SINK_LOG_DEPTH>,
    errors: heapless::Vec<DmaError, SINK_LOG_DEPTH>,
}

/// Recording mock of the caller's [`CaptureSink`].
pub struct RecordingSink {
    state: Mutex<CriticalSectionRawMutex, RefCell<SinkState>>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SinkState::default())),
        }
    }

    /// All completions delivered so far, in order.
    pub fn dones(&self) -> heapless::Vec<CaptureDone, SINK_LOG_DEPTH> {
        self.state.lock(|cell| cell.borrow().dones.clone())
    }

    /// All errors delivered so far, in order.
    pub fn errors(&self) -> heapless::Vec<DmaError, SINK_LOG_DEPTH> {
        self.state.lock(|cell| cell.borrow().errors.clone())
    }

    /// Number of completions delivered so far.
    pub fn done_count(&self) -> usize {
        self.state.lock(|cell| cell.borrow().dones.len())
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSink for RecordingSink {
    fn on_capture_done(&self, done: CaptureDone) {
        self.state.lock(|cell| {
            let _ = cell.borrow_mut().dones.push(done);
        });
    }

    fn on_capture_error(&self, error: DmaError) {
        self.state.lock(|cell| {
            let _ = cell.borrow_mut().errors.push(error);
        });
    }
}
