//! # viewlink-pipeline
//!
//! Render-side pipeline for the viewlink relay: the bounded frame delivery
//! queue and its drop policy, the timestamp policy engine, the pixel
//! format converters, the render-sink collaborator contract, the renderer
//! state machine with its dedicated delivery thread, and the capture
//! session that wires everything to a capture device.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  CaptureSession    │ ◄── desired-vs-actual convergence
//! │  (one lock)        │     reconciler → renderer renegotiation
//! └─────────┬──────────┘
//!           │ accepted frames
//!           ▼
//! ┌────────────────────┐
//! │  FrameQueue        │ ◄── drop-stale / drop-oldest policy
//! │  (bounded)         │     one-frame look-ahead
//! └─────────┬──────────┘
//!           │ delivery thread
//!           ▼
//! ┌────────────────────┐
//! │  TimestampEngine   │ ◄── policy-driven (start, stop)
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │  Converter         │ ◄── passthrough / v210→P010 / decoder
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │  RenderSink        │ ◄── external display sink
//! └────────────────────┘
//! ```
//!
//! # Threading
//!
//! Three thread contexts touch the pipeline: the driver's callback thread
//! (session lock, short queue critical section), the delivery thread
//! (condvar-driven drain; conversion and sink hand-off outside the queue
//! lock), and the control thread (build/start/stop/settings). No async
//! runtime is involved; every thread blocks conventionally.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use viewlink_pipeline::config::RendererOptions;
//! use viewlink_pipeline::renderer::Renderer;
//! use viewlink_pipeline::timestamp::TimestampPolicy;
//!
//! let options = RendererOptions::builder()
//!     .policy(TimestampPolicy::ClockSmart)
//!     .queue_max_size(8)
//!     .build();
//!
//! let mut renderer = Renderer::new(my_sink, options)?;
//! renderer.build(&description, clock_rate, None)?;
//! renderer.start()?;
//! // capture callback: renderer.queue_frame(frame)?
//! renderer.stop()?;
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod config;
pub mod convert;
pub mod error;
pub mod queue;
pub mod renderer;
pub mod session;
pub mod sink;
pub mod timestamp;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Configuration types
pub use config::{RendererOptions, Settings, DEFAULT_TIMELINE_RATE};

// Converter types
pub use convert::{ConvertStatus, Converter, VideoDecoder};

// Error types
pub use error::{PipelineError, Result};

// Queue types
pub use queue::FrameQueue;

// Renderer types
pub use renderer::{Renderer, RendererObserver, RendererState, StateUpdate};

// Session types
pub use session::{CaptureSession, DesiredState, SessionStatus, SinkFactory};

// Sink types
pub use sink::{
    FormatOverrides, NominalRange, RenderSink, SinkFormat, SinkFrame, SinkState, TransferMatrix,
};

// Timestamp types
pub use timestamp::{FrameTimestamps, TimestampEngine, TimestampPolicy};

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
