//! # viewlink-capture
//!
//! Capture-side domain for the viewlink relay pipeline: timing clocks,
//! pixel formats and color model, HDR metadata, immutable stream
//! descriptions, driver buffer ownership, the capture-device collaborator
//! contract, and the video-state reconciler that merges partial hardware
//! signals into consistent snapshots.
//!
//! This crate is part of the viewlink workspace and is consumed by
//! `viewlink-pipeline`, which owns the render side (frame queue, timestamp
//! policies, renderer state machine, converters).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  capture driver    │ ◄── external, consumed via CaptureDevice /
//! │  (driver thread)   │     CaptureObserver contracts
//! └─────────┬──────────┘
//!           │ SignalEvent / VideoFrame
//!           ▼
//! ┌────────────────────┐
//! │  Reconciler        │ ◄── merges partial signals
//! │  (per channel)     │     publishes StreamDescription snapshots
//! └─────────┬──────────┘
//!           │ StreamDescription
//!           ▼
//!     viewlink-pipeline (renderer negotiation, delivery)
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use viewlink_capture::device::SignalEvent;
//! use viewlink_capture::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
//! use viewlink_capture::reconciler::Reconciler;
//!
//! let mut reconciler = Reconciler::new();
//! reconciler.apply(SignalEvent::Lock(LockState::Locked));
//! reconciler.apply(SignalEvent::Mode(DisplayMode::new(1920, 1080, true, 1000, 60_000)));
//! reconciler.apply(SignalEvent::Pixels(PixelFormat::Uyvy8));
//! reconciler.apply(SignalEvent::Transfer(Eotf::Sdr));
//! reconciler.apply(SignalEvent::Colors(ColorSpace::Rec709));
//!
//! let description = reconciler.note_frame().expect("stream describable");
//! assert!(description.valid);
//! ```
//!
//! # Cargo Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `mock-device` | No | Scripted in-memory capture device for tests |

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod clock;
pub mod config;
pub mod description;
pub mod device;
pub mod error;
pub mod format;
pub mod frame;
pub mod hdr;
pub mod reconciler;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

pub use clock::{ClockTicks, MonotonicClock, TimingClock};
pub use config::CaptureSelection;
pub use description::StreamDescription;
pub use device::{
    CaptureDevice, CaptureInput, CaptureObserver, DeviceState, SignalEvent,
};
pub use error::{CaptureError, Result};
pub use format::{
    Chromaticities, ColorSpace, DisplayMode, Eotf, LockState, PixelFormat, Xy,
};
pub use frame::{BufferRelease, FrameBuffer, VideoFrame};
pub use hdr::HdrMeta;
pub use reconciler::Reconciler;

#[cfg(feature = "mock-device")]
pub use device::mock::{MockDevice, ScriptClock};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
