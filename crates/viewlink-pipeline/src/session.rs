//! Capture Session
//!
//! Wires the capture device's callbacks through the reconciler into the
//! renderer, under a single lock so that stream-description publication
//! and renderer renegotiation are serialized: the renderer never sees two
//! state changes out of arrival order, and never sees a frame for a
//! description it has not accepted.
//!
//! The session holds a *desired* state (rendering or stopped) next to the
//! renderer's *actual* state and converges after every external event:
//! rebuilding the renderer from scratch whenever a stream change is
//! rejected, tearing it down when the stream goes invalid, and building it
//! as soon as a valid description exists. The control layer never
//! sequences rebuilds itself; it only edits the desired state.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use viewlink_capture::description::StreamDescription;
use viewlink_capture::device::{CaptureObserver, DeviceState, SignalEvent};
use viewlink_capture::error::CaptureError;
use viewlink_capture::frame::VideoFrame;
use viewlink_capture::reconciler::Reconciler;

use crate::config::RendererOptions;
use crate::error::Result;
use crate::renderer::{Renderer, RendererState, StateUpdate};
use crate::sink::RenderSink;

/// What the control layer wants the pipeline to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    /// Relay frames to the sink whenever the stream is describable.
    Rendering,
    /// Keep the pipeline torn down.
    Stopped,
}

/// Produces a fresh sink for each renderer session.
///
/// Rebuilds always get a new sink; a sink that refused or failed once is
/// never reused.
pub type SinkFactory = Box<dyn FnMut() -> Box<dyn RenderSink> + Send>;

/// A point-in-time view of the session for the control layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    /// The control layer's requested state.
    pub desired: DesiredState,
    /// The renderer's actual state, when one exists.
    pub renderer: Option<RendererState>,
    /// Device state as last reported.
    pub device: DeviceState,
    /// Frames discarded because no renderer was accepting.
    pub discarded_frames: u64,
}

struct Inner {
    reconciler: Reconciler,
    renderer: Option<Renderer>,
    sink_factory: SinkFactory,
    options: RendererOptions,
    clock_rate: u64,
    desired: DesiredState,
    device: DeviceState,
    discarded_frames: u64,
    rebuilds: u64,
}

/// One capture-to-render session: reconciler, renderer, and the
/// desired-vs-actual convergence loop, all under one lock.
pub struct CaptureSession {
    inner: Mutex<Inner>,
}

impl CaptureSession {
    /// Create a session. `clock_rate` is the capture clock's tick rate;
    /// the options are validated up front.
    pub fn new(
        sink_factory: SinkFactory,
        options: RendererOptions,
        clock_rate: u64,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            inner: Mutex::new(Inner {
                reconciler: Reconciler::new(),
                renderer: None,
                sink_factory,
                options,
                clock_rate,
                desired: DesiredState::Stopped,
                device: DeviceState::Unknown,
                discarded_frames: 0,
                rebuilds: 0,
            }),
        })
    }

    /// Edit the desired state and converge toward it.
    pub fn set_desired(&self, desired: DesiredState) {
        let mut inner = self.inner.lock();
        if inner.desired != desired {
            info!(?desired, "desired state changed");
            inner.desired = desired;
        }
        inner.converge();
    }

    /// Current view for the control layer.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.lock();
        SessionStatus {
            desired: inner.desired,
            renderer: inner.renderer.as_ref().map(Renderer::state),
            device: inner.device,
            discarded_frames: inner.discarded_frames,
        }
    }

    /// Renderer sessions built so far (first build included).
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.inner.lock().rebuilds
    }
}

impl Inner {
    /// Fold a publication into the renderer: compatible changes pass
    /// through, incompatible ones tear down and rebuild from scratch.
    fn renegotiate(&mut self, description: &StreamDescription) {
        let Some(renderer) = self.renderer.as_mut() else {
            self.converge();
            return;
        };

        match renderer.on_video_state(description) {
            StateUpdate::Unchanged | StateUpdate::HdrChanged => {}
            StateUpdate::Rejected => {
                debug!("stream change rejected; tearing renderer down");
                self.teardown();
                self.converge();
            }
        }
    }

    /// Stop (when possible) and discard the current renderer.
    fn teardown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            if renderer.state() == RendererState::Rendering {
                if let Err(err) = renderer.stop() {
                    warn!(%err, "renderer stop during teardown failed");
                }
            }
        }
    }

    /// One step of desired-vs-actual reconciliation.
    fn converge(&mut self) {
        // A terminal renderer is only ever replaced, never revived
        if self
            .renderer
            .as_ref()
            .map_or(false, |r| r.state().is_terminal())
        {
            self.teardown();
        }

        match self.desired {
            DesiredState::Stopped => self.teardown(),
            DesiredState::Rendering => {
                if self.renderer.is_some() {
                    return;
                }
                let Some(description) = self.reconciler.last_published().cloned() else {
                    return;
                };
                if !description.valid {
                    return;
                }
                if let Err(err) = self.build_and_start(&description) {
                    warn!(%err, "renderer build failed; waiting for next stream change");
                    self.teardown();
                }
            }
        }
    }

    fn build_and_start(&mut self, description: &StreamDescription) -> Result<()> {
        let sink = (self.sink_factory)();
        let mut renderer = Renderer::new(sink, self.options.clone())?;
        renderer.build(description, self.clock_rate, None)?;
        renderer.start()?;
        self.rebuilds += 1;
        info!(mode = %description.mode, "renderer session {} started", self.rebuilds);
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl CaptureObserver for CaptureSession {
    fn on_device_state(&self, state: DeviceState) {
        let mut inner = self.inner.lock();
        debug!(?state, "device state");
        inner.device = state;
        match state {
            // A (re)starting or failed device invalidates everything
            // accumulated; re-accumulate from scratch
            DeviceState::Starting | DeviceState::Failed => {
                if let Some(invalid) = inner.reconciler.reset() {
                    inner.renegotiate(&invalid);
                } else {
                    inner.converge();
                }
            }
            _ => inner.converge(),
        }
    }

    fn on_card_state(&self, detail: &str) {
        debug!(detail, "card state change");
    }

    fn on_video_signal(&self, event: SignalEvent) {
        let mut inner = self.inner.lock();
        if let Some(description) = inner.reconciler.apply(event) {
            inner.renegotiate(&description);
        }
    }

    fn on_frame(&self, frame: VideoFrame) {
        let mut inner = self.inner.lock();
        if let Some(description) = inner.reconciler.note_frame() {
            inner.renegotiate(&description);
        }

        let rendering = inner
            .renderer
            .as_ref()
            .map_or(false, |r| r.state() == RendererState::Rendering);
        if !rendering {
            // No accepting renderer: the frame is dropped here, releasing
            // its buffer token
            inner.discarded_frames += 1;
            return;
        }

        let handed = match inner.renderer.as_ref() {
            Some(renderer) => renderer.queue_frame(frame),
            None => Ok(()),
        };
        if let Err(err) = handed {
            warn!(%err, "frame hand-off failed");
            inner.teardown();
            inner.converge();
        }
    }

    fn on_error(&self, error: CaptureError) {
        warn!(%error, "capture device error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::{MockSink, SinkRecord};
    use crate::timestamp::TimestampPolicy;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use viewlink_capture::clock::ClockTicks;
    use viewlink_capture::device::mock::MockDevice;
    use viewlink_capture::device::CaptureDevice;
    use viewlink_capture::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
    use viewlink_capture::frame::{FrameBuffer, VideoFrame};
    use viewlink_capture::hdr::HdrMeta;

    const RATE: u64 = 10_000_000;

    type Records = Arc<PlMutex<Vec<Arc<PlMutex<SinkRecord>>>>>;

    fn session_with_records() -> (Arc<CaptureSession>, Records) {
        let records: Records = Arc::new(PlMutex::new(Vec::new()));
        let factory_records = records.clone();
        let factory: SinkFactory = Box::new(move || {
            let (sink, record) = MockSink::new();
            factory_records.lock().push(record);
            Box::new(sink)
        });
        let options = RendererOptions::builder()
            .policy(TimestampPolicy::ClockTheoretical)
            .timeline_rate(RATE)
            .build();
        let session = Arc::new(CaptureSession::new(factory, options, RATE).expect("session"));
        (session, records)
    }

    fn emit_full_signal_set(device: &MockDevice, mode: DisplayMode) {
        device.emit_signal(SignalEvent::Lock(LockState::Locked));
        device.emit_signal(SignalEvent::Mode(mode));
        device.emit_signal(SignalEvent::Pixels(PixelFormat::Uyvy8));
        device.emit_signal(SignalEvent::Transfer(Eotf::Sdr));
        device.emit_signal(SignalEvent::Colors(ColorSpace::Rec709));
    }

    fn frame_for(mode: DisplayMode, seq: u64, ts: u64) -> VideoFrame {
        let size = PixelFormat::Uyvy8.bytes_per_row(mode.width) * mode.height as usize;
        let bytes: Arc<[u8]> = Arc::from(vec![0u8; size].into_boxed_slice());
        VideoFrame::new(FrameBuffer::unmanaged(bytes), seq, ClockTicks(ts))
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !predicate() {
            assert!(Instant::now() < deadline, "timed out waiting on session");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn small_mode() -> DisplayMode {
        DisplayMode::new(4, 2, true, 1000, 50_000)
    }

    #[test]
    fn test_end_to_end_wiring() {
        let (session, records) = session_with_records();
        let mut device = MockDevice::new();
        device.set_observer(session.clone());
        session.set_desired(DesiredState::Rendering);

        device.start_capture().expect("start");
        emit_full_signal_set(&device, small_mode());

        // Signals alone are not enough; a frame completes the picture
        assert!(session.status().renderer.is_none());
        device.emit_frame(frame_for(small_mode(), 0, 1_000_000));

        // The completing frame built the renderer and was itself queued
        assert_eq!(session.status().renderer, Some(RendererState::Rendering));
        assert_eq!(session.status().discarded_frames, 0);

        device.emit_frame(frame_for(small_mode(), 1, 1_200_000));
        device.emit_frame(frame_for(small_mode(), 2, 1_400_000));
        wait_for(|| records.lock()[0].lock().frames.len() == 3);

        session.set_desired(DesiredState::Stopped);
        assert!(session.status().renderer.is_none());
    }

    #[test]
    fn test_incompatible_change_rebuilds() {
        let (session, records) = session_with_records();
        let mut device = MockDevice::new();
        device.set_observer(session.clone());
        session.set_desired(DesiredState::Rendering);

        emit_full_signal_set(&device, small_mode());
        device.emit_frame(frame_for(small_mode(), 0, 1_000_000));
        assert_eq!(session.rebuild_count(), 1);

        // Geometry change: rejected, torn down, rebuilt with a fresh sink
        let bigger = DisplayMode::new(8, 4, true, 1000, 50_000);
        device.emit_signal(SignalEvent::Mode(bigger));
        assert_eq!(session.rebuild_count(), 2);
        assert_eq!(records.lock().len(), 2);
        assert_eq!(session.status().renderer, Some(RendererState::Rendering));
    }

    #[test]
    fn test_hdr_change_does_not_rebuild() {
        let (session, records) = session_with_records();
        let mut device = MockDevice::new();
        device.set_observer(session.clone());
        session.set_desired(DesiredState::Rendering);

        emit_full_signal_set(&device, small_mode());
        device.emit_frame(frame_for(small_mode(), 0, 1_000_000));

        device.emit_signal(SignalEvent::Hdr(Some(HdrMeta::rec2020_1000_nits())));
        assert_eq!(session.rebuild_count(), 1);
        let records = records.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lock().hdr_updates.len(), 1);
    }

    #[test]
    fn test_signal_dropout_tears_down() {
        let (session, _records) = session_with_records();
        let mut device = MockDevice::new();
        device.set_observer(session.clone());
        session.set_desired(DesiredState::Rendering);

        emit_full_signal_set(&device, small_mode());
        device.emit_frame(frame_for(small_mode(), 0, 1_000_000));
        assert_eq!(session.status().renderer, Some(RendererState::Rendering));

        // Pixel layout drops to unknown: invalid publication, teardown
        device.emit_signal(SignalEvent::Pixels(PixelFormat::Unknown));
        assert!(session.status().renderer.is_none());

        // Frames during the outage are discarded, not queued
        let before = session.status().discarded_frames;
        device.emit_frame(frame_for(small_mode(), 1, 1_200_000));
        assert_eq!(session.status().discarded_frames, before + 1);

        // Layout comes back: the stream re-validates and a renderer returns
        device.emit_signal(SignalEvent::Pixels(PixelFormat::Uyvy8));
        assert_eq!(session.status().renderer, Some(RendererState::Rendering));
    }

    #[test]
    fn test_desired_stopped_blocks_build() {
        let (session, _records) = session_with_records();
        let mut device = MockDevice::new();
        device.set_observer(session.clone());

        // Stream is fully describable but nobody asked for rendering
        emit_full_signal_set(&device, small_mode());
        device.emit_frame(frame_for(small_mode(), 0, 1_000_000));
        assert!(session.status().renderer.is_none());

        // Flipping desired converges immediately off the held description
        session.set_desired(DesiredState::Rendering);
        assert_eq!(session.status().renderer, Some(RendererState::Rendering));
        session.set_desired(DesiredState::Stopped);
        assert!(session.status().renderer.is_none());
    }
}
