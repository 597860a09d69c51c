//! Per-instance capture state machine and task loop.
//!
//! `CaptureComponent` is the single consumer of one instance's event channel.
//! All instance state — the lifecycle [`State`], the DMA binding, the priming
//! queue and the in-flight request queue — is owned here and mutated only on
//! the instance task, so the state machine can reason sequentially: events
//! arrive in FIFO order and no two are ever handled concurrently.
//!
//! Event legality by state (anything else is an illegal request):
//!
//! | Event \ State | Booted | Ready        | PreAct         | Act         |
//! |---------------|--------|--------------|----------------|-------------|
//! | Activate      | act    | —            | —              | —           |
//! | Deactivate    | —      | deact        | —              | —           |
//! | Init          | —      | init         | —              | —           |
//! | Run           | —      | exec_on_ready| exec_on_preact | exec_on_act |
//! | Stop          | —      | —            | stop_on_preact | stop_on_act |
//! | DmaComplete   | —      | notify       | notify         | notify      |

use capture_hal::{
    BufferPool, CaptureBuffer, CaptureDevice, CaptureDone, CaptureSink, DmaChannelId,
    DmaCompletionHandler, DmaDone, DmaEngine, DmaErrorSeverity, DmaInitParams, DmaIntCode,
    DmaReadRequest, MemPoolId,
};
use heapless::Deque;

use crate::error::CaptureError;
use crate::event::{
    ActivateParams, CaptureEvent, EventKind, InitParams, RunParams, State, StopParams,
};
use crate::pool::{CapturePool, CaptureSlot};
use crate::queue::{CaptureRequest, RequestQueue};

/// Number of requests that must be queued before the DMA engine is started.
///
/// The engine needs look-ahead: a start with fewer queued reads underruns
/// immediately.
pub const PRIMING_DEPTH: usize = 2;

/// Capacity of the in-flight request queue.
pub const REQUEST_QUEUE_DEPTH: usize = 16;

/// State machine and task body for one capture instance.
///
/// Construct via [`CapturePool::component`], then drive it by awaiting
/// [`run`](CaptureComponent::run) on the instance's task. Exactly one
/// component must exist per pool slot.
pub struct CaptureComponent {
    slot: &'static CaptureSlot,
    notifier: &'static dyn DmaCompletionHandler,
    driver: &'static dyn DmaEngine,
    buffers: &'static dyn BufferPool,
    state: State,
    dma_channel: Option<DmaChannelId>,
    // Bind-time attributes; overwritten by every successful activate.
    output_device: CaptureDevice,
    mem_pool: MemPoolId,
    // Init-time attributes.
    channels: u8,
    bytes_per_sample: usize,
    sink: Option<&'static dyn CaptureSink>,
    pre_queue: Deque<RunParams, PRIMING_DEPTH>,
    requests: RequestQueue<CaptureRequest, REQUEST_QUEUE_DEPTH>,
}

impl<const N: usize> CapturePool<N> {
    /// Build the component for instance `index`.
    ///
    /// The application calls this once per slot at startup and spawns
    /// [`CaptureComponent::run`] on a dedicated task. Returns `None` for an
    /// out-of-range index.
    pub fn component(
        &'static self,
        index: usize,
        driver: &'static dyn DmaEngine,
        buffers: &'static dyn BufferPool,
    ) -> Option<CaptureComponent> {
        let slot = self.slot(index)?;
        Some(CaptureComponent {
            slot,
            notifier: self,
            driver,
            buffers,
            state: State::Booted,
            dma_channel: None,
            output_device: CaptureDevice::AnalogMic,
            mem_pool: MemPoolId::new(0),
            channels: 0,
            bytes_per_sample: 0,
            sink: None,
            pre_queue: Deque::new(),
            requests: RequestQueue::new(),
        })
    }
}

impl CaptureComponent {
    /// Task runtime loop: block on the instance's private queue, dispatch,
    /// repeat. Never returns; instances are torn down externally once the
    /// pool reports idle.
    pub async fn run(mut self) {
        loop {
            let event = self.slot.receive_event().await;
            if let Err(_error) = self.dispatch(event) {
                #[cfg(feature = "defmt")]
                defmt::error!("capture event failed: {}", _error);
            }
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    fn dispatch(&mut self, event: CaptureEvent) -> Result<(), CaptureError> {
        match (event, self.state) {
            (CaptureEvent::Activate(params), State::Booted) => self.act(&params),
            (CaptureEvent::Deactivate, State::Ready) => self.deact(),
            (CaptureEvent::Init(params), State::Ready) => self.init(&params),
            (CaptureEvent::Run(params), State::Ready) => self.exec_on_ready(params),
            (CaptureEvent::Run(params), State::PreAct) => self.exec_on_preact(params),
            (CaptureEvent::Run(params), State::Act) => self.exec_on_act(params),
            (CaptureEvent::Stop(_), State::PreAct) => self.stop_on_preact(),
            (CaptureEvent::Stop(params), State::Act) => self.stop_on_act(params),
            (CaptureEvent::DmaComplete(code), State::Ready | State::PreAct | State::Act) => {
                self.notify(code)
            }
            (event, state) => self.illegal(&event, state),
        }
    }

    /// Bind and activate the DMA channel for the requested path.
    ///
    /// Synchronous: replies to the caller's rendezvous either way. On failure
    /// the instance stays in `Booted`; no partial cleanup is attempted.
    fn act(&mut self, params: &ActivateParams) -> Result<(), CaptureError> {
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "ACT: path {}, outdev {}",
            params.path,
            params.output_device
        );

        let outcome = self.bind_dma(params);
        self.slot.signal_reply(outcome.is_ok());
        outcome
    }

    fn bind_dma(&mut self, params: &ActivateParams) -> Result<(), CaptureError> {
        let channel = self
            .driver
            .get_dma_handle(params.path)
            .map_err(CaptureError::Dma)?;
        self.driver.activate(channel).map_err(CaptureError::Dma)?;

        self.dma_channel = Some(channel);
        self.output_device = params.output_device;
        self.mem_pool = params.mem_pool;
        // Publish the binding for interrupt-context lookup. From here on it
        // is immutable until deactivation.
        self.slot.bind_dma(Some(channel));
        self.state = State::Ready;
        Ok(())
    }

    /// Deactivate and free the DMA channel. Synchronous.
    fn deact(&mut self) -> Result<(), CaptureError> {
        #[cfg(feature = "defmt")]
        defmt::debug!("DEACT");

        let outcome = self.unbind_dma();
        self.slot.signal_reply(outcome.is_ok());
        outcome
    }

    fn unbind_dma(&mut self) -> Result<(), CaptureError> {
        let channel = self.dma_channel.ok_or(CaptureError::InvalidHandle)?;
        self.driver.deactivate(channel).map_err(CaptureError::Dma)?;
        self.driver.free_dma_handle(channel).map_err(CaptureError::Dma)?;

        self.slot.bind_dma(None);
        self.dma_channel = None;
        self.state = State::Booted;
        Ok(())
    }

    /// Apply channel/format configuration and register the completion hook.
    /// Pure configuration: no state transition, no reply.
    fn init(&mut self, params: &InitParams) -> Result<(), CaptureError> {
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "INIT: ch num {}, bit width {}",
            params.channels,
            params.bit_width
        );

        let channel = self.dma_channel.ok_or(CaptureError::InvalidHandle)?;
        self.sink = Some(params.sink);
        self.channels = params.channels;
        self.bytes_per_sample = params.bit_width.bytes_per_sample();

        self.driver
            .init(&DmaInitParams {
                channel,
                channels: params.channels,
                format: params.bit_width.dma_format(),
                fade_enable: false,
            })
            .map_err(CaptureError::Dma)?;
        self.driver
            .register_completion(channel, self.notifier)
            .map_err(CaptureError::Dma)
    }

    /// First submit: queue only. The engine needs more than one request
    /// before it can start, so no read is issued yet.
    fn exec_on_ready(&mut self, params: RunParams) -> Result<(), CaptureError> {
        if self.pre_queue.push_back(params).is_err() {
            return Err(CaptureError::QueueFull);
        }
        self.state = State::PreAct;
        Ok(())
    }

    /// Subsequent submit while priming: once the priming depth is reached,
    /// hand every queued request to the engine and issue the single start.
    fn exec_on_preact(&mut self, params: RunParams) -> Result<(), CaptureError> {
        if self.pre_queue.push_back(params).is_err() {
            return Err(CaptureError::QueueFull);
        }
        if !self.pre_queue.is_full() {
            return Ok(());
        }

        while let Some(pending) = self.pre_queue.pop_front() {
            match self.issue_read(pending) {
                Ok(()) => {}
                // A dropped request degrades the stream but must not keep
                // the engine from starting with the requests it has.
                Err(CaptureError::Allocation) => {}
                Err(error) => return Err(error),
            }
        }

        let channel = self.dma_channel.ok_or(CaptureError::InvalidHandle)?;
        self.driver.start(channel).map_err(CaptureError::Dma)?;
        self.state = State::Act;
        Ok(())
    }

    /// Steady-state submit: one read queued per call, engine already running.
    fn exec_on_act(&mut self, params: RunParams) -> Result<(), CaptureError> {
        self.issue_read(params)
    }

    /// Stop before the engine ever started: nothing to stop at the driver
    /// level. The priming queue is discarded (no buffers are owned yet —
    /// allocation happens at read-issue time) and the instance returns to
    /// `Ready` so deactivation becomes reachable.
    fn stop_on_preact(&mut self) -> Result<(), CaptureError> {
        #[cfg(feature = "defmt")]
        defmt::debug!("STOP (preact)");

        while self.pre_queue.pop_front().is_some() {}
        self.state = State::Ready;
        self.slot.signal_reply(true);
        Ok(())
    }

    /// Stop the running engine with the caller's wind-down mode. Synchronous;
    /// a failed stop still replies so the caller is never left hanging.
    fn stop_on_act(&mut self, params: StopParams) -> Result<(), CaptureError> {
        #[cfg(feature = "defmt")]
        defmt::debug!("STOP");

        let outcome = self.stop_engine(params);
        self.slot.signal_reply(outcome.is_ok());
        outcome
    }

    fn stop_engine(&mut self, params: StopParams) -> Result<(), CaptureError> {
        let channel = self.dma_channel.ok_or(CaptureError::InvalidHandle)?;
        self.driver
            .stop(channel, params.mode)
            .map_err(CaptureError::Dma)?;
        self.state = State::Ready;
        Ok(())
    }

    /// Resolve a forwarded completion on task context.
    ///
    /// A successful transfer hands the oldest queued request's buffer to the
    /// caller's sink. Errors are reported to the sink; recoverable ones leave
    /// the pipeline running, fatal ones are propagated to the supervisory
    /// layer instead of asserting.
    fn notify(&mut self, code: DmaIntCode) -> Result<(), CaptureError> {
        let channel = self.dma_channel.ok_or(CaptureError::InvalidHandle)?;
        match self.driver.notify_complete(channel, code) {
            Ok(done) => self.deliver_done(done),
            Err(error) => {
                if let Some(sink) = self.sink {
                    sink.on_capture_error(error);
                }
                match error.severity() {
                    DmaErrorSeverity::Recoverable => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("recoverable dma error: {}", error);
                        Ok(())
                    }
                    DmaErrorSeverity::Fatal => Err(CaptureError::Dma(error)),
                }
            }
        }
    }

    fn deliver_done(&mut self, done: DmaDone) -> Result<(), CaptureError> {
        // A completion with no queued request means producer and consumer
        // have desynchronized; surface it instead of inventing a buffer.
        let request = *self.requests.peek().ok_or(CaptureError::QueueMissing)?;
        let sink = self.sink.ok_or(CaptureError::NotConfigured)?;

        sink.on_capture_done(CaptureDone {
            output_device: self.output_device,
            end_flag: done.end_flag,
            buffer: CaptureBuffer {
                handle: request.buffer,
                sample_count: request.sample_count,
            },
        });

        self.requests.pop().map(|_| ())
    }

    /// Allocate a capture buffer, enqueue the request, and hand the read to
    /// the engine. Allocation failure drops the request with a warning; the
    /// pipeline continues degraded.
    fn issue_read(&mut self, params: RunParams) -> Result<(), CaptureError> {
        let channel = self.dma_channel.ok_or(CaptureError::InvalidHandle)?;

        #[allow(clippy::cast_possible_truncation)] // sample counts fit usize on all supported targets
        let len_bytes = (params.sample_count as usize)
            .saturating_mul(usize::from(self.channels))
            .saturating_mul(self.bytes_per_sample);

        let buffer = match self.buffers.alloc(self.mem_pool, len_bytes) {
            Ok(buffer) => buffer,
            Err(_error) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("capture buffer allocation failed: {}", _error);
                return Err(CaptureError::Allocation);
            }
        };

        if let Err(error) = self.requests.push(CaptureRequest {
            buffer,
            sample_count: params.sample_count,
        }) {
            self.buffers.free(buffer);
            return Err(error);
        }

        self.driver
            .read(&DmaReadRequest {
                channel,
                address: buffer.address(),
                sample_count: params.sample_count,
            })
            .map_err(CaptureError::Dma)
    }

    fn illegal(&self, event: &CaptureEvent, state: State) -> Result<(), CaptureError> {
        #[cfg(feature = "defmt")]
        defmt::error!("illegal request: {} in {}", event.kind(), state);
        // Synchronous commands get their rendezvous reply even when rejected,
        // so a caller that issued one in the wrong state fails instead of
        // hanging.
        if matches!(
            event.kind(),
            EventKind::Activate | EventKind::Deactivate | EventKind::Stop
        ) {
            self.slot.signal_reply(false);
        }
        Err(CaptureError::IllegalRequest {
            event: event.kind(),
            state,
        })
    }
}
