//! Capture Device Collaborator Contract
//!
//! The concrete capture driver lives outside this workspace; the pipeline
//! consumes it through the [`CaptureDevice`] capability set and feeds on
//! its callbacks through [`CaptureObserver`]. The contract mirrors how
//! capture hardware actually behaves:
//!
//! - Every callback arrives on a driver-owned thread, at any time,
//!   interleaved arbitrarily with control calls.
//! - Device state transitions are driven by the driver alone; clients only
//!   request `start_capture`/`stop_capture` and observe the outcome.
//! - Stream properties arrive as independent partial signals
//!   ([`SignalEvent`]), never as one coherent record; reconciling them is
//!   the [`Reconciler`](crate::reconciler::Reconciler)'s job.
//!
//! Exactly one observer is registered per device; panics must never cross
//! the callback boundary.

use std::sync::Arc;

use crate::clock::TimingClock;
use crate::error::{CaptureError, Result};
use crate::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
use crate::frame::VideoFrame;
use crate::hdr::HdrMeta;

/// Capture device lifecycle state, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Device opened, not capturing.
    Ready,
    /// Capture running; frames and signals flowing.
    Capturing,
    /// Start requested, hardware spinning up.
    Starting,
    /// Stop requested, hardware winding down.
    Stopping,
    /// State not yet reported.
    Unknown,
    /// Unrecoverable fault; reopen required.
    Failed,
}

/// A selectable physical input on a capture card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInput {
    /// Driver-assigned input id, stable across sessions.
    pub id: u32,
    /// Human-readable connector name ("HDMI 1", "SDI A", ...).
    pub name: String,
}

/// One partial hardware signal about the current stream.
///
/// The channels update independently and asynchronously; no single event
/// is sufficient to describe the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    /// Capture-lock status changed.
    Lock(LockState),
    /// Display mode (geometry / time-base) changed.
    Mode(DisplayMode),
    /// Pixel layout changed.
    Pixels(PixelFormat),
    /// Transfer function changed.
    Transfer(Eotf),
    /// Color space changed.
    Colors(ColorSpace),
    /// HDR metadata changed (or went away).
    Hdr(Option<HdrMeta>),
}

/// Receiver for everything a capture device reports.
///
/// All methods may be invoked from a driver-owned thread at any time.
/// Implementations must return quickly and must not panic.
pub trait CaptureObserver: Send + Sync {
    /// Device lifecycle state changed.
    fn on_device_state(&self, state: DeviceState);

    /// Card-level condition changed (input unplugged, reference lost, ...).
    fn on_card_state(&self, detail: &str);

    /// A partial stream property was (re)reported.
    fn on_video_signal(&self, event: SignalEvent);

    /// A frame arrived. The frame's buffer token keeps the driver storage
    /// alive until the frame is dropped.
    fn on_frame(&self, frame: VideoFrame);

    /// The driver hit an error it could not absorb.
    fn on_error(&self, error: CaptureError);
}

/// Capability set of a capture device, resolved once at session build.
pub trait CaptureDevice: Send {
    /// Begin capture on the selected input.
    fn start_capture(&mut self) -> Result<()>;

    /// Stop capture. Idempotent: stopping an idle device is a no-op.
    fn stop_capture(&mut self) -> Result<()>;

    /// Select a physical input by id.
    fn set_input(&mut self, input: u32) -> Result<()>;

    /// The inputs this device exposes.
    fn supported_inputs(&self) -> Vec<CaptureInput>;

    /// The hardware timing clock frames are stamped against.
    fn clock(&self) -> &dyn TimingClock;

    /// Register the single observer. Replaces any previous registration.
    fn set_observer(&mut self, observer: Arc<dyn CaptureObserver>);
}

/// Scripted in-memory capture device for tests and examples.
///
/// Exposes the driver side of the contract so tests can play back an exact
/// sequence of callbacks: `emit_signal`, `emit_frame`, `emit_device_state`.
#[cfg(any(test, feature = "mock-device"))]
pub mod mock {
    use super::{
        Arc, CaptureDevice, CaptureInput, CaptureObserver, DeviceState, Result, SignalEvent,
        TimingClock, VideoFrame,
    };
    use crate::clock::ClockTicks;
    use crate::error::CaptureError;
    use parking_lot::Mutex;

    /// Deterministic manually-advanced clock.
    #[derive(Debug, Default)]
    pub struct ScriptClock {
        now: Mutex<u64>,
        rate: u64,
    }

    impl ScriptClock {
        /// Clock at `rate` ticks per second, starting at zero.
        #[must_use]
        pub fn new(rate: u64) -> Self {
            Self {
                now: Mutex::new(0),
                rate,
            }
        }

        /// Advance the reading by `ticks`.
        pub fn advance(&self, ticks: u64) {
            *self.now.lock() += ticks;
        }
    }

    impl TimingClock for ScriptClock {
        fn now(&self) -> ClockTicks {
            ClockTicks(*self.now.lock())
        }

        fn ticks_per_second(&self) -> u64 {
            self.rate
        }
    }

    /// Scripted capture device.
    pub struct MockDevice {
        observer: Option<Arc<dyn CaptureObserver>>,
        clock: ScriptClock,
        state: DeviceState,
        input: u32,
        inputs: Vec<CaptureInput>,
    }

    impl MockDevice {
        /// Device with one HDMI input and a 10MHz script clock.
        #[must_use]
        pub fn new() -> Self {
            Self {
                observer: None,
                clock: ScriptClock::new(10_000_000),
                state: DeviceState::Unknown,
                input: 1,
                inputs: vec![CaptureInput {
                    id: 1,
                    name: "HDMI 1".to_string(),
                }],
            }
        }

        /// The script clock, for advancing time mid-test.
        #[must_use]
        pub fn script_clock(&self) -> &ScriptClock {
            &self.clock
        }

        /// Currently selected input id.
        #[must_use]
        pub fn selected_input(&self) -> u32 {
            self.input
        }

        /// Play a partial stream signal into the observer.
        pub fn emit_signal(&self, event: SignalEvent) {
            if let Some(observer) = &self.observer {
                observer.on_video_signal(event);
            }
        }

        /// Play a frame into the observer.
        pub fn emit_frame(&self, frame: VideoFrame) {
            if let Some(observer) = &self.observer {
                observer.on_frame(frame);
            }
        }

        /// Report a device state change.
        pub fn emit_device_state(&mut self, state: DeviceState) {
            self.state = state;
            if let Some(observer) = &self.observer {
                observer.on_device_state(state);
            }
        }
    }

    impl Default for MockDevice {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CaptureDevice for MockDevice {
        fn start_capture(&mut self) -> Result<()> {
            match self.state {
                DeviceState::Capturing | DeviceState::Starting => Err(CaptureError::WrongState {
                    operation: "start",
                    state: self.state,
                }),
                _ => {
                    self.emit_device_state(DeviceState::Starting);
                    self.emit_device_state(DeviceState::Capturing);
                    Ok(())
                }
            }
        }

        fn stop_capture(&mut self) -> Result<()> {
            // Idempotent: stopping an idle device is a no-op
            if self.state == DeviceState::Capturing {
                self.emit_device_state(DeviceState::Stopping);
                self.emit_device_state(DeviceState::Ready);
            }
            Ok(())
        }

        fn set_input(&mut self, input: u32) -> Result<()> {
            if self.inputs.iter().any(|i| i.id == input) {
                self.input = input;
                Ok(())
            } else {
                Err(CaptureError::UnknownInput(input))
            }
        }

        fn supported_inputs(&self) -> Vec<CaptureInput> {
            self.inputs.clone()
        }

        fn clock(&self) -> &dyn TimingClock {
            &self.clock
        }

        fn set_observer(&mut self, observer: Arc<dyn CaptureObserver>) {
            self.observer = Some(observer);
        }
    }
}
