//! # viewlink
//!
//! Low-latency capture-to-display video relay for Rust.
//!
//! viewlink relays live video from a hardware capture source to a display
//! sink with minimal, predictable latency while preserving exact color and
//! HDR semantics across mid-stream format changes. This crate provides a
//! unified interface to the viewlink workspace libraries:
//!
//! - **[`capture`]** - Capture-side domain: timing clocks, pixel formats,
//!   HDR metadata, stream descriptions, and video-state reconciliation
//! - **[`pipeline`]** - Render-side pipeline: bounded frame delivery,
//!   timestamp policies, pixel conversion, and the renderer state machine
//!
//! # Features
//!
//! All features are enabled by default. You can selectively enable only
//! what you need:
//!
//! ```toml
//! # Use everything (default)
//! viewlink = "0.2"
//!
//! # Capture-side types only
//! viewlink = { version = "0.2", default-features = false, features = ["capture"] }
//! ```
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `capture` | Yes | Capture-side domain types and reconciliation |
//! | `pipeline` | Yes | Frame delivery, timestamps, renderer |
//! | `full` | No | Everything |
//!
//! # Quick Start
//!
//! ## Reconcile hardware signals into a stream description
//!
//! ```rust
//! use viewlink::capture::device::SignalEvent;
//! use viewlink::capture::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
//! use viewlink::capture::reconciler::Reconciler;
//!
//! let mut reconciler = Reconciler::new();
//! reconciler.apply(SignalEvent::Lock(LockState::Locked));
//! reconciler.apply(SignalEvent::Mode(DisplayMode::new(1920, 1080, true, 1000, 60_000)));
//! reconciler.apply(SignalEvent::Pixels(PixelFormat::V210));
//! reconciler.apply(SignalEvent::Transfer(Eotf::Pq));
//! reconciler.apply(SignalEvent::Colors(ColorSpace::Rec2020));
//!
//! let description = reconciler.note_frame().expect("stream describable");
//! assert!(description.valid);
//! ```
//!
//! ## Full Pipeline: device → session → sink
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use viewlink::pipeline::{CaptureSession, DesiredState, RendererOptions};
//!
//! let options = RendererOptions::default();
//! let session = Arc::new(CaptureSession::new(sink_factory, options, clock_rate)?);
//!
//! device.set_observer(session.clone());
//! session.set_desired(DesiredState::Rendering);
//! device.start_capture()?;
//! ```

// ============================================================================
// FEATURE-GATED RE-EXPORTS
// ============================================================================

/// Capture-side domain: clocks, formats, descriptions, reconciliation.
#[cfg(feature = "capture")]
pub use viewlink_capture as capture;

/// Render-side pipeline: queue, timestamps, converters, renderer.
#[cfg(feature = "pipeline")]
pub use viewlink_pipeline as pipeline;

// ============================================================================
// CRATE-LEVEL ITEMS
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[cfg(all(feature = "capture", feature = "pipeline"))]
    #[test]
    fn test_sub_crates_agree_on_types() {
        // The pipeline consumes the capture crate's description type
        let description = capture::StreamDescription::invalid();
        assert!(!description.valid);
        let options = pipeline::RendererOptions::default();
        assert!(options.validate().is_ok());
    }
}
