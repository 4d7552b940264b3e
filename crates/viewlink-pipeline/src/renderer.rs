//! Renderer State Machine
//!
//! Owns the negotiation with the downstream sink, the delivery thread that
//! drains the frame queue, and the session lifecycle:
//!
//! ```text
//! Unknown ──build()──► Ready ──start()──► Starting ──► Rendering
//!                                                         │
//!                                          stop()         ▼
//!                           Stopped ◄─────────────── Stopping
//! ```
//!
//! `Failed` is reachable from every non-terminal state; `Stopped` and
//! `Failed` are terminal for the session; recovery always means building
//! a fresh renderer from `Unknown`.
//!
//! Mid-stream description changes go through
//! [`on_video_state`](Renderer::on_video_state): an invalid description or
//! one differing in geometry, color space, EOTF, or pixel encoding is
//! rejected (the caller tears down and rebuilds); a change confined to HDR
//! metadata is pushed through to the sink without a rebuild.
//!
//! The registered observer is notified synchronously exactly once per
//! transition, never twice in a row with the same state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use viewlink_capture::description::StreamDescription;
use viewlink_capture::frame::VideoFrame;

use crate::config::RendererOptions;
use crate::convert::{ConvertStatus, Converter, VideoDecoder};
use crate::error::{PipelineError, Result};
use crate::queue::FrameQueue;
use crate::sink::{RenderSink, SinkFormat, SinkFrame, SinkState};
use crate::timestamp::TimestampEngine;

/// How long the delivery thread sleeps waiting for frames before
/// rechecking the shutdown flag.
const DELIVERY_WAIT: Duration = Duration::from_millis(10);

/// Bounded wait for the sink to report stopped.
const SINK_STOP_WAIT_MS: u64 = 1000;

/// Renderer lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// Constructed; no format negotiated.
    Unknown,
    /// Output format negotiated with the sink.
    Ready,
    /// Start requested, sink spinning up.
    Starting,
    /// Delivery thread running, frames flowing.
    Rendering,
    /// Stop requested, winding down.
    Stopping,
    /// Session over; terminal.
    Stopped,
    /// Session aborted; terminal.
    Failed,
}

impl RendererState {
    /// Whether the session can never leave this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RendererState::Stopped | RendererState::Failed)
    }
}

/// Outcome of offering a changed stream description to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    /// Nothing the renderer cares about changed.
    Unchanged,
    /// Only HDR metadata changed; it was pushed through live.
    HdrChanged,
    /// The change is incompatible; tear down and rebuild from scratch.
    Rejected,
}

/// Synchronous receiver for renderer state transitions.
pub trait RendererObserver: Send + Sync {
    /// The renderer entered `state`.
    fn on_state(&self, state: RendererState);
}

/// State shared with the delivery thread.
struct Shared {
    queue: FrameQueue,
    state: Mutex<RendererState>,
    observer: Mutex<Option<Arc<dyn RendererObserver>>>,
    sink: Mutex<Box<dyn RenderSink>>,
    converter: Mutex<Option<Converter>>,
    engine: Mutex<Option<TimestampEngine>>,
    running: AtomicBool,
    delivery_error: Mutex<Option<PipelineError>>,
}

impl Shared {
    /// Move to `new`, notifying the observer outside the state lock.
    /// Same-state transitions are dropped, so the observer never sees the
    /// same value twice in a row.
    fn transition(&self, new: RendererState) {
        let observer = {
            let mut state = self.state.lock();
            if *state == new {
                return;
            }
            debug!(from = ?*state, to = ?new, "renderer transition");
            *state = new;
            self.observer.lock().clone()
        };
        if let Some(observer) = observer {
            observer.on_state(new);
        }
    }

    fn state(&self) -> RendererState {
        *self.state.lock()
    }

    fn fail(&self, err: &PipelineError) {
        error!(%err, "renderer failed");
        self.transition(RendererState::Failed);
    }
}

/// Negotiates with a sink and relays queued frames to it.
pub struct Renderer {
    shared: Arc<Shared>,
    options: RendererOptions,
    accepted: Option<StreamDescription>,
    delivery: Option<JoinHandle<()>>,
}

impl Renderer {
    /// Wrap `sink` with validated `options`. The renderer starts in
    /// `Unknown` with nothing negotiated.
    pub fn new(sink: Box<dyn RenderSink>, options: RendererOptions) -> Result<Self> {
        options.validate()?;
        let queue = FrameQueue::new(options.queue_max_size)?;
        Ok(Self {
            shared: Arc::new(Shared {
                queue,
                state: Mutex::new(RendererState::Unknown),
                observer: Mutex::new(None),
                sink: Mutex::new(sink),
                converter: Mutex::new(None),
                engine: Mutex::new(None),
                running: AtomicBool::new(false),
                delivery_error: Mutex::new(None),
            }),
            options,
            accepted: None,
            delivery: None,
        })
    }

    /// Register the observer. Replaces any previous registration.
    pub fn set_observer(&self, observer: Arc<dyn RendererObserver>) {
        *self.shared.observer.lock() = Some(observer);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RendererState {
        self.shared.state()
    }

    /// The description this session was built against.
    #[must_use]
    pub fn accepted(&self) -> Option<&StreamDescription> {
        self.accepted.as_ref()
    }

    /// Frames evicted by the delivery queue so far.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.shared.queue.dropped_count()
    }

    /// Negotiate an output format with the sink for `description`.
    ///
    /// Only legal from `Unknown`. `clock_rate` is the capture clock's tick
    /// rate; a `decoder` forces the generic decode path. Failure leaves
    /// the renderer `Failed`; negotiation is never retried automatically.
    pub fn build(
        &mut self,
        description: &StreamDescription,
        clock_rate: u64,
        decoder: Option<Box<dyn VideoDecoder>>,
    ) -> Result<()> {
        let state = self.shared.state();
        if state != RendererState::Unknown {
            let err = PipelineError::WrongState {
                operation: "build",
                state,
            };
            self.shared.fail(&err);
            return Err(err);
        }

        match self.negotiate(description, clock_rate, decoder) {
            Ok(()) => {
                info!(mode = %description.mode, format = %description.pixel_format, "renderer built");
                self.accepted = Some(description.clone());
                self.shared.transition(RendererState::Ready);
                Ok(())
            }
            Err(err) => {
                self.shared.fail(&err);
                Err(err)
            }
        }
    }

    fn negotiate(
        &mut self,
        description: &StreamDescription,
        clock_rate: u64,
        decoder: Option<Box<dyn VideoDecoder>>,
    ) -> Result<()> {
        if !description.valid || !description.is_internally_consistent() {
            return Err(PipelineError::negotiation(
                "stream description is not valid",
            ));
        }

        let converter = Converter::select(description, decoder)?;

        let frame_duration = frame_duration_ticks(description, self.options.timeline_rate);
        let engine = TimestampEngine::new(
            self.options.policy,
            clock_rate,
            self.options.timeline_rate,
            frame_duration,
            self.options.frame_offset_ms,
        )?;

        let format = SinkFormat::derive(
            description,
            converter.output_format(),
            converter.out_frame_size(),
            self.options.timeline_rate,
            frame_duration,
            &self.options.overrides,
        );
        self.shared.sink.lock().negotiate(&format)?;

        if let Some(hdr) = &description.hdr {
            self.shared.sink.lock().submit_hdr(hdr)?;
        }

        *self.shared.converter.lock() = Some(converter);
        *self.shared.engine.lock() = Some(engine);
        Ok(())
    }

    /// Move `Ready → Starting → Rendering`, spawning the delivery thread.
    pub fn start(&mut self) -> Result<()> {
        let state = self.shared.state();
        if state != RendererState::Ready {
            let err = PipelineError::WrongState {
                operation: "start",
                state,
            };
            self.shared.fail(&err);
            return Err(err);
        }

        self.shared.transition(RendererState::Starting);
        if let Err(err) = self.shared.sink.lock().start() {
            self.shared.fail(&err);
            return Err(err);
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = self.shared.clone();
        let need_lookahead = self.options.policy.needs_lookahead();
        self.delivery = Some(std::thread::spawn(move || {
            delivery_loop(&shared, need_lookahead);
        }));

        self.shared.transition(RendererState::Rendering);
        Ok(())
    }

    /// Move `Rendering → Stopping → Stopped`.
    ///
    /// Joins the delivery thread, waits (bounded) for the sink to report
    /// stopped, then resets the queue and verifies it drained; a
    /// non-empty queue afterwards is a protocol violation.
    pub fn stop(&mut self) -> Result<()> {
        let state = self.shared.state();
        if state != RendererState::Rendering {
            let err = PipelineError::WrongState {
                operation: "stop",
                state,
            };
            self.shared.fail(&err);
            return Err(err);
        }

        self.shared.transition(RendererState::Stopping);
        self.shared.running.store(false, Ordering::Release);
        // reset() also wakes the delivery thread out of its condvar wait
        self.shared.queue.reset();

        if let Some(handle) = self.delivery.take() {
            if handle.join().is_err() {
                let err = PipelineError::sink("delivery thread panicked");
                self.shared.fail(&err);
                return Err(err);
            }
        }

        if let Err(err) = self.shared.sink.lock().stop() {
            self.shared.fail(&err);
            return Err(err);
        }
        if let Err(err) = self.wait_for_sink_stopped() {
            self.shared.fail(&err);
            return Err(err);
        }

        // The delivery thread may have raced one last pop; purge again and
        // verify the invariant before declaring Stopped
        self.shared.queue.reset();
        let remaining = self.shared.queue.len();
        if remaining != 0 {
            let err = PipelineError::QueueNotDrained(remaining);
            self.shared.fail(&err);
            return Err(err);
        }

        if let Some(err) = self.shared.delivery_error.lock().take() {
            self.shared.fail(&err);
            return Err(err);
        }

        info!("renderer stopped");
        self.shared.transition(RendererState::Stopped);
        Ok(())
    }

    fn wait_for_sink_stopped(&self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(SINK_STOP_WAIT_MS);
        loop {
            if self.shared.sink.lock().state() == SinkState::Stopped {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PipelineError::StopTimeout(SINK_STOP_WAIT_MS));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Offer a changed stream description.
    ///
    /// Rejection leaves the currently accepted description untouched; the
    /// caller is expected to tear this renderer down and build a new one.
    pub fn on_video_state(&mut self, description: &StreamDescription) -> StateUpdate {
        let Some(accepted) = &self.accepted else {
            return StateUpdate::Rejected;
        };

        if !description.valid {
            warn!("stream description went invalid; rejecting");
            return StateUpdate::Rejected;
        }

        let incompatible = description.mode != accepted.mode
            || description.pixel_format != accepted.pixel_format
            || description.color_space != accepted.color_space
            || description.eotf != accepted.eotf
            || description.vertical_flip != accepted.vertical_flip;
        if incompatible {
            info!(
                old = %accepted.mode,
                new = %description.mode,
                "incompatible stream change; rebuild required"
            );
            return StateUpdate::Rejected;
        }

        if description.hdr == accepted.hdr {
            return StateUpdate::Unchanged;
        }

        // HDR-only change: push through without a rebuild
        if let Some(hdr) = &description.hdr {
            if let Err(err) = self.shared.sink.lock().submit_hdr(hdr) {
                self.shared.fail(&err);
                return StateUpdate::Rejected;
            }
        }
        if let Some(accepted) = &mut self.accepted {
            accepted.hdr = description.hdr.clone();
        }
        debug!("HDR metadata updated in place");
        StateUpdate::HdrChanged
    }

    /// Hand a captured frame to the delivery queue.
    ///
    /// Only legal while `Rendering`; anything else is a protocol violation
    /// that aborts the session.
    pub fn queue_frame(&self, frame: VideoFrame) -> Result<()> {
        let state = self.shared.state();
        if state != RendererState::Rendering {
            let err = PipelineError::FrameBeforeAccept;
            self.shared.fail(&err);
            return Err(err);
        }
        self.shared.queue.push(frame);
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // A renderer discarded without stop() must not leave its delivery
        // thread running
        self.shared.running.store(false, Ordering::Release);
        self.shared.queue.reset();
        if let Some(handle) = self.delivery.take() {
            let _ = handle.join();
        }
    }
}

/// Nominal frame duration of `description` in timeline ticks.
fn frame_duration_ticks(description: &StreamDescription, timeline_rate: u64) -> i64 {
    let mode = description.mode;
    if mode.time_scale == 0 {
        return 0;
    }
    let wide = u128::from(timeline_rate) * u128::from(mode.frame_duration)
        / u128::from(mode.time_scale);
    i64::try_from(wide).unwrap_or(i64::MAX)
}

/// Drain the queue: timestamps, conversion, sink hand-off. Conversion and
/// submission run outside the queue lock.
fn delivery_loop(shared: &Shared, need_lookahead: bool) {
    let mut scratch = Vec::new();

    while shared.running.load(Ordering::Acquire) {
        if !shared.queue.wait_for_frame(need_lookahead, DELIVERY_WAIT) {
            continue;
        }
        let Some((frame, lookahead)) = shared.queue.pop(need_lookahead) else {
            continue;
        };

        let stamped = {
            let mut engine = shared.engine.lock();
            match engine.as_mut() {
                Some(engine) => engine.timestamps(frame.timestamp(), lookahead),
                None => Err(PipelineError::ConverterUnconfigured),
            }
        };
        let timestamps = match stamped {
            Ok(timestamps) => timestamps,
            Err(err) => {
                *shared.delivery_error.lock() = Some(err);
                shared.transition(RendererState::Failed);
                return;
            }
        };

        let status = {
            let mut converter = shared.converter.lock();
            match converter.as_mut() {
                Some(converter) => converter.format_frame(frame.bytes(), &mut scratch),
                None => Err(PipelineError::ConverterUnconfigured),
            }
        };
        match status {
            Ok(ConvertStatus::Produced) => {}
            Ok(ConvertStatus::NeedMoreInput) => {
                // Legitimate: the decoder wants another input first
                continue;
            }
            Err(err) => {
                *shared.delivery_error.lock() = Some(err);
                shared.transition(RendererState::Failed);
                return;
            }
        }

        let submitted = shared.sink.lock().submit_frame(SinkFrame {
            bytes: &scratch,
            timestamps,
        });
        if let Err(err) = submitted {
            *shared.delivery_error.lock() = Some(err);
            shared.transition(RendererState::Failed);
            return;
        }
        // Dropping the frame here releases its driver buffer token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::MockSink;
    use crate::timestamp::TimestampPolicy;
    use std::sync::Arc;
    use viewlink_capture::clock::ClockTicks;
    use viewlink_capture::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
    use viewlink_capture::frame::{FrameBuffer, VideoFrame};
    use viewlink_capture::hdr::HdrMeta;

    /// 10MHz everywhere keeps clock and timeline units identical.
    const RATE: u64 = 10_000_000;

    fn description() -> StreamDescription {
        StreamDescription {
            valid: true,
            lock: LockState::Locked,
            // 4x2 UYVY at 50fps: 16-byte frames, 200_000-tick duration
            mode: DisplayMode::new(4, 2, true, 1000, 50_000),
            pixel_format: PixelFormat::Uyvy8,
            eotf: Eotf::Sdr,
            color_space: ColorSpace::Rec709,
            vertical_flip: false,
            hdr: None,
        }
    }

    fn frame(seq: u64, ts: u64) -> VideoFrame {
        let bytes: Arc<[u8]> = Arc::from(vec![0u8; 16].into_boxed_slice());
        VideoFrame::new(FrameBuffer::unmanaged(bytes), seq, ClockTicks(ts))
    }

    fn options(policy: TimestampPolicy) -> RendererOptions {
        RendererOptions::builder()
            .policy(policy)
            .timeline_rate(RATE)
            .build()
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: parking_lot::Mutex<Vec<RendererState>>,
    }

    impl RendererObserver for RecordingObserver {
        fn on_state(&self, state: RendererState) {
            self.states.lock().push(state);
        }
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !predicate() {
            assert!(Instant::now() < deadline, "timed out waiting on pipeline");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_full_session_delivers_frames() {
        let (sink, record) = MockSink::new();
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockTheoretical))
                .expect("renderer");
        let observer = Arc::new(RecordingObserver::default());
        renderer.set_observer(observer.clone());

        renderer.build(&description(), RATE, None).expect("build");
        renderer.start().expect("start");

        renderer.queue_frame(frame(0, 1_000_000)).expect("frame 0");
        renderer.queue_frame(frame(1, 1_200_000)).expect("frame 1");
        wait_for(|| record.lock().frames.len() == 2);

        renderer.stop().expect("stop");

        let frames = record.lock().frames.clone();
        // Passthrough copy: 4x2 UYVY = 16 bytes
        assert_eq!(frames[0].0, 16);
        // First frame establishes timeline zero; 50fps nominal stop
        assert_eq!(frames[0].1.start, 0);
        assert_eq!(frames[0].1.stop, Some(200_000));
        assert_eq!(frames[1].1.start, 200_000);

        assert_eq!(
            *observer.states.lock(),
            vec![
                RendererState::Ready,
                RendererState::Starting,
                RendererState::Rendering,
                RendererState::Stopping,
                RendererState::Stopped,
            ]
        );
        assert_eq!(renderer.state(), RendererState::Stopped);
        assert!(renderer.shared.queue.is_empty());
    }

    #[test]
    fn test_negotiation_failure_leaves_failed() {
        let (mut sink, _record) = MockSink::new();
        sink.refuse_negotiation = Some("format not supported");
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockSmart)).expect("renderer");

        let err = renderer
            .build(&description(), RATE, None)
            .expect_err("negotiation refused");
        assert!(matches!(err, PipelineError::NegotiationFailed(_)));
        assert_eq!(renderer.state(), RendererState::Failed);
    }

    #[test]
    fn test_invalid_description_refused_at_build() {
        let (sink, _record) = MockSink::new();
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockSmart)).expect("renderer");
        let err = renderer
            .build(&StreamDescription::invalid(), RATE, None)
            .expect_err("invalid description");
        assert!(matches!(err, PipelineError::NegotiationFailed(_)));
    }

    #[test]
    fn test_build_only_from_unknown() {
        let (sink, _record) = MockSink::new();
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockSmart)).expect("renderer");
        renderer.build(&description(), RATE, None).expect("build");

        let err = renderer
            .build(&description(), RATE, None)
            .expect_err("second build");
        assert!(matches!(err, PipelineError::WrongState { .. }));
        assert_eq!(renderer.state(), RendererState::Failed);
    }

    #[test]
    fn test_stop_from_non_rendering_is_violation() {
        let (sink, _record) = MockSink::new();
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockSmart)).expect("renderer");
        renderer.build(&description(), RATE, None).expect("build");

        let err = renderer.stop().expect_err("stop before start");
        assert!(err.is_protocol_violation());
        assert_eq!(renderer.state(), RendererState::Failed);
    }

    #[test]
    fn test_frame_before_accept_is_violation() {
        let (sink, _record) = MockSink::new();
        let renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockSmart)).expect("renderer");
        let err = renderer.queue_frame(frame(0, 0)).expect_err("early frame");
        assert!(matches!(err, PipelineError::FrameBeforeAccept));
        assert_eq!(renderer.state(), RendererState::Failed);
    }

    #[test]
    fn test_sink_stop_timeout_is_fatal() {
        let (mut sink, _record) = MockSink::new();
        sink.hang_on_stop = true;
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockTheoretical))
                .expect("renderer");
        renderer.build(&description(), RATE, None).expect("build");
        renderer.start().expect("start");

        let err = renderer.stop().expect_err("sink never stops");
        assert!(matches!(err, PipelineError::StopTimeout(_)));
        assert_eq!(renderer.state(), RendererState::Failed);
    }

    #[test]
    fn test_renegotiation_rejection_preserves_accepted() {
        let (sink, _record) = MockSink::new();
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockSmart)).expect("renderer");
        renderer.build(&description(), RATE, None).expect("build");

        let mut changed = description();
        changed.mode = DisplayMode::new(8, 4, true, 1000, 50_000);
        assert_eq!(renderer.on_video_state(&changed), StateUpdate::Rejected);
        // The accepted description is untouched by a rejection
        assert_eq!(renderer.accepted().expect("accepted"), &description());

        let mut changed = description();
        changed.eotf = Eotf::Pq;
        assert_eq!(renderer.on_video_state(&changed), StateUpdate::Rejected);

        assert_eq!(
            renderer.on_video_state(&StreamDescription::invalid()),
            StateUpdate::Rejected
        );

        // Rejection is a verdict, not a failure
        assert_eq!(renderer.state(), RendererState::Ready);
    }

    #[test]
    fn test_hdr_only_change_pushed_through() {
        let (sink, record) = MockSink::new();
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockSmart)).expect("renderer");
        renderer.build(&description(), RATE, None).expect("build");

        let mut with_hdr = description();
        with_hdr.hdr = Some(HdrMeta::rec2020_1000_nits());
        assert_eq!(renderer.on_video_state(&with_hdr), StateUpdate::HdrChanged);

        // Metadata reached the sink without a second negotiation
        assert_eq!(record.lock().hdr_updates.len(), 1);
        assert_eq!(record.lock().negotiated.len(), 1);
        assert_eq!(renderer.accepted().expect("accepted").hdr, with_hdr.hdr);

        // The same metadata again is no longer a change
        assert_eq!(renderer.on_video_state(&with_hdr), StateUpdate::Unchanged);
    }

    #[test]
    fn test_clock_clock_policy_uses_lookahead() {
        let (sink, record) = MockSink::new();
        let mut renderer =
            Renderer::new(Box::new(sink), options(TimestampPolicy::ClockClock)).expect("renderer");
        renderer.build(&description(), RATE, None).expect("build");
        renderer.start().expect("start");

        renderer.queue_frame(frame(0, 5_000_000)).expect("frame 0");
        renderer.queue_frame(frame(1, 5_190_000)).expect("frame 1");
        renderer.queue_frame(frame(2, 5_410_000)).expect("frame 2");

        // With the one-frame look-ahead held back, two frames deliver
        wait_for(|| record.lock().frames.len() == 2);
        let frames = record.lock().frames.clone();
        // Stops track the next frame's real start, not the nominal duration
        assert_eq!(frames[0].1.start, 0);
        assert_eq!(frames[0].1.stop, Some(190_000));
        assert_eq!(frames[1].1.stop, Some(410_000));

        renderer.stop().expect("stop");
    }
}
