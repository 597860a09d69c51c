//! Instance pool and caller-facing API.
//!
//! [`CapturePool`] owns the fixed table of capture instances. Each slot
//! bundles everything shared between contexts:
//!
//! - the instance's private event channel (callers and the ISR produce,
//!   the instance task is the single consumer),
//! - the rendezvous reply [`Signal`] for synchronous commands,
//! - an availability flag claimed by compare-and-swap,
//! - the bound hardware DMA channel id, published atomically so the
//!   interrupt-context completion handler can map a channel back to its
//!   instance without taking any lock.
//!
//! The pool is an explicitly constructed, explicitly owned object: the
//! application places it in a `static` (or `StaticCell`) and hands
//! `&'static` references to callers and tasks. There is no hidden global.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use capture_hal::{
    BitWidth, CaptureDevice, CaptureSink, DmaChannelId, DmaCompletionHandler, DmaIntCode,
    MemPoolId, StopMode,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::error::CaptureError;
use crate::event::{ActivateParams, CaptureEvent, InitParams, RunParams, StopParams};

/// Number of capture instances a default pool holds. One instance binds one
/// hardware DMA channel.
pub const MAX_CAPTURE_INSTANCES: usize = 2;

/// Depth of each instance's private event channel.
///
/// Sized for the steady-state pipeline (submits and completions interleave)
/// plus command slack; a full channel is backpressure to the caller and a
/// dropped-with-log condition for the ISR.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Sentinel for "no DMA channel bound" in the slot's atomic binding.
const DMA_UNBOUND: u8 = u8::MAX;

pub(crate) type EventChannel = Channel<CriticalSectionRawMutex, CaptureEvent, EVENT_QUEUE_DEPTH>;

// CriticalSectionRawMutex: the channel is written from ISR context
// (dma_complete → try_send) and from caller tasks, and read from the instance
// task. try_send is non-blocking; the critical section only spans the queue
// bookkeeping, well under any audio DMA service deadline.
pub(crate) struct CaptureSlot {
    events: EventChannel,
    reply: Signal<CriticalSectionRawMutex, bool>,
    available: AtomicBool,
    dma_channel: AtomicU8,
}

impl CaptureSlot {
    fn new() -> Self {
        Self {
            events: Channel::new(),
            reply: Signal::new(),
            available: AtomicBool::new(true),
            dma_channel: AtomicU8::new(DMA_UNBOUND),
        }
    }

    /// Block until the next event arrives. Instance task only.
    pub(crate) async fn receive_event(&self) -> CaptureEvent {
        self.events.receive().await
    }

    /// Enqueue an event, awaiting channel space. Caller context only.
    pub(crate) async fn send_event(&self, event: CaptureEvent) {
        self.events.send(event).await;
    }

    /// Enqueue an event without blocking. Safe from ISR context.
    pub(crate) fn try_send_event(&self, event: CaptureEvent) -> Result<(), CaptureError> {
        self.events.try_send(event).map_err(|_| CaptureError::QueueFull)
    }

    /// Post the result of a synchronous command. Instance task only.
    pub(crate) fn signal_reply(&self, result: bool) {
        self.reply.signal(result);
    }

    /// Publish (or clear) the bound DMA channel for ISR lookup.
    pub(crate) fn bind_dma(&self, channel: Option<DmaChannelId>) {
        let raw = channel.map_or(DMA_UNBOUND, DmaChannelId::raw);
        self.dma_channel.store(raw, Ordering::Release);
    }

    fn bound_dma_raw(&self) -> u8 {
        self.dma_channel.load(Ordering::Acquire)
    }
}

/// Handle identifying one acquired capture instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureHandle {
    index: usize,
}

impl CaptureHandle {
    /// Index of the instance in the pool table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

/// Fixed-capacity table of capture instances.
pub struct CapturePool<const N: usize = MAX_CAPTURE_INSTANCES> {
    slots: [CaptureSlot; N],
}

impl<const N: usize> CapturePool<N> {
    /// Create a pool with all `N` instances available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| CaptureSlot::new()),
        }
    }

    /// Number of instance slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// True iff every instance is available — the gate for tearing down the
    /// pool and its tasks.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.slots
            .iter()
            .all(|slot| slot.available.load(Ordering::Acquire))
    }

    /// Acquire an instance for `device` and activate its DMA path.
    ///
    /// Blocks until the instance task replies. On a failed activation the
    /// instance stays in `Booted`, the slot is returned to the pool, and the
    /// call has no lasting effect.
    pub async fn acquire(
        &self,
        device: CaptureDevice,
        mem_pool: MemPoolId,
    ) -> Result<CaptureHandle, CaptureError> {
        let Some(index) = self.try_claim() else {
            #[cfg(feature = "defmt")]
            defmt::error!("capture pool exhausted");
            return Err(CaptureError::ResourceExhausted);
        };
        let slot = self.slots.get(index).ok_or(CaptureError::InvalidHandle)?;

        let params = ActivateParams {
            path: device.dma_path(),
            output_device: device,
            mem_pool,
        };
        if self.rendezvous(slot, CaptureEvent::Activate(params)).await {
            Ok(CaptureHandle { index })
        } else {
            self.release_slot(index);
            Err(CaptureError::CommandFailed)
        }
    }

    /// Deactivate the instance and return it to the pool.
    ///
    /// Blocks until the instance task replies. Legal only while the instance
    /// is stopped (`Ready`); a release while capturing is rejected with
    /// [`CaptureError::CommandFailed`] and the slot stays bound so the caller
    /// can stop first and retry. Releasing an already-released handle fails
    /// with [`CaptureError::InvalidHandle`].
    pub async fn release(&self, handle: CaptureHandle) -> Result<(), CaptureError> {
        let slot = self.bound_slot(handle)?;
        if self.rendezvous(slot, CaptureEvent::Deactivate).await {
            self.release_slot(handle.index);
            Ok(())
        } else {
            Err(CaptureError::CommandFailed)
        }
    }

    /// Configure channel count, bit width and the completion sink.
    ///
    /// Fire-and-forget: configuration errors surface through the instance
    /// task's log, not a reply.
    pub fn configure(
        &self,
        handle: CaptureHandle,
        channels: u8,
        bit_width: BitWidth,
        sink: &'static dyn CaptureSink,
    ) -> Result<(), CaptureError> {
        let slot = self.bound_slot(handle)?;
        slot.try_send_event(CaptureEvent::Init(InitParams {
            channels,
            bit_width,
            sink,
        }))
    }

    /// Submit one buffer-transfer request of `sample_count` samples.
    ///
    /// Asynchronous: the result arrives later through the configured sink.
    /// [`CaptureError::QueueFull`] is backpressure — retry or drop.
    pub fn submit(&self, handle: CaptureHandle, sample_count: u32) -> Result<(), CaptureError> {
        let slot = self.bound_slot(handle)?;
        slot.try_send_event(CaptureEvent::Run(RunParams { sample_count }))
    }

    /// Stop the stream. Blocks until the instance task replies; a failed or
    /// rejected stop still replies, so the caller is never left hanging.
    /// Legal only while work has been submitted (`PreAct`/`Act`); stopping an
    /// idle instance fails with [`CaptureError::CommandFailed`].
    pub async fn stop(&self, handle: CaptureHandle, mode: StopMode) -> Result<(), CaptureError> {
        let slot = self.bound_slot(handle)?;
        if self.rendezvous(slot, CaptureEvent::Stop(StopParams { mode })).await {
            Ok(())
        } else {
            Err(CaptureError::CommandFailed)
        }
    }

    /// Map a hardware DMA channel back to its owning instance.
    ///
    /// Read-only scan over the atomically published bindings; safe from
    /// interrupt context.
    #[must_use]
    pub fn lookup_by_dma_channel(&self, channel: DmaChannelId) -> Option<usize> {
        if channel.raw() == DMA_UNBOUND {
            return None;
        }
        self.slots
            .iter()
            .position(|slot| slot.bound_dma_raw() == channel.raw())
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&CaptureSlot> {
        self.slots.get(index)
    }

    /// Claim the first available slot. Compare-and-swap makes concurrent
    /// acquires race-free: at most one caller wins each slot.
    fn try_claim(&self) -> Option<usize> {
        self.slots.iter().position(|slot| {
            slot.available
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    fn release_slot(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.available.store(true, Ordering::Release);
        }
    }

    /// Resolve `handle` to its slot, rejecting out-of-range and unbound
    /// handles.
    fn bound_slot(&self, handle: CaptureHandle) -> Result<&CaptureSlot, CaptureError> {
        let slot = self
            .slots
            .get(handle.index)
            .ok_or(CaptureError::InvalidHandle)?;
        if slot.available.load(Ordering::Acquire) {
            return Err(CaptureError::InvalidHandle);
        }
        Ok(slot)
    }

    async fn rendezvous(&self, slot: &CaptureSlot, event: CaptureEvent) -> bool {
        // One synchronous command per instance may be in flight at a time;
        // reset clears any reply a crashed caller never consumed.
        slot.reply.reset();
        slot.send_event(event).await;
        slot.reply.wait().await
    }
}

impl<const N: usize> Default for CapturePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DmaCompletionHandler for CapturePool<N> {
    // ISR context: classify, look up the owner over immutable post-bind
    // data, and forward with a non-blocking send. No locks, no allocation.
    fn dma_complete(&self, channel: DmaChannelId, result_code: u32) {
        let code = DmaIntCode::from_hw_code(result_code);
        let Some(index) = self.lookup_by_dma_channel(channel) else {
            #[cfg(feature = "defmt")]
            defmt::error!("completion for unbound dma channel {}", channel.raw());
            return;
        };
        let Some(slot) = self.slots.get(index) else {
            return;
        };
        if slot.try_send_event(CaptureEvent::DmaComplete(code)).is_err() {
            // Dropping the completion desynchronizes the request queue; the
            // instance task reports QueueMissing on the next completion.
            #[cfg(feature = "defmt")]
            defmt::error!("capture[{}]: event queue full, completion dropped", index);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_until_released() {
        let pool: CapturePool<2> = CapturePool::new();
        let first = pool.try_claim().unwrap();
        let second = pool.try_claim().unwrap();
        assert_ne!(first, second);
        assert!(pool.try_claim().is_none());
        assert!(!pool.is_idle());

        pool.release_slot(first);
        assert_eq!(pool.try_claim(), Some(first));
    }

    #[test]
    fn idle_only_when_all_slots_are_free() {
        let pool: CapturePool<2> = CapturePool::new();
        assert!(pool.is_idle());
        let index = pool.try_claim().unwrap();
        assert!(!pool.is_idle());
        pool.release_slot(index);
        assert!(pool.is_idle());
    }

    #[test]
    fn bound_slot_rejects_stale_and_out_of_range_handles() {
        let pool: CapturePool<2> = CapturePool::new();
        let handle = CaptureHandle { index: 0 };
        // Not claimed yet.
        assert!(matches!(
            pool.bound_slot(handle),
            Err(CaptureError::InvalidHandle)
        ));
        let index = pool.try_claim().unwrap();
        assert!(pool.bound_slot(CaptureHandle { index }).is_ok());
        assert!(matches!(
            pool.bound_slot(CaptureHandle { index: 9 }),
            Err(CaptureError::InvalidHandle)
        ));
    }

    #[test]
    fn dma_lookup_follows_the_published_binding() {
        let pool: CapturePool<2> = CapturePool::new();
        let channel = DmaChannelId::new(3);
        assert_eq!(pool.lookup_by_dma_channel(channel), None);

        pool.slot(1).unwrap().bind_dma(Some(channel));
        assert_eq!(pool.lookup_by_dma_channel(channel), Some(1));

        pool.slot(1).unwrap().bind_dma(None);
        assert_eq!(pool.lookup_by_dma_channel(channel), None);
        // The unbound sentinel itself never matches.
        assert_eq!(pool.lookup_by_dma_channel(DmaChannelId::new(u8::MAX)), None);
    }
}
