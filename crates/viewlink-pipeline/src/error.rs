//! Error types for pipeline operations
//!
//! The taxonomy separates configuration errors (fail fast at the call that
//! introduced them), protocol violations (programming-contract breaches
//! that abort the session), and resource errors (propagate out of build,
//! leaving the renderer Failed rather than partially built). Transient
//! hardware noise never reaches this enum; the reconciler absorbs it.

use thiserror::Error;

use viewlink_capture::format::PixelFormat;

use crate::renderer::RendererState;

/// Errors that can occur in the render-side pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Queue bound below the minimum of 1.
    #[error("Invalid queue size {0}; must be at least 1")]
    InvalidQueueSize(usize),

    /// Frame offset outside the accepted range.
    #[error("Invalid frame offset {0} ms; must be within ±{1} ms")]
    InvalidFrameOffset(i64, i64),

    /// Negotiation reached a pixel or color enum nobody recognizes.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(PixelFormat),

    /// The presentation timeline rate must be positive.
    #[error("Invalid timeline rate {0}; must be positive")]
    InvalidTimelineRate(u64),

    /// The downstream sink refused the proposed format.
    #[error("Sink negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The sink failed during streaming.
    #[error("Sink error: {0}")]
    Sink(String),

    /// An operation was attempted from a state that forbids it.
    #[error("Protocol violation: {operation} while {state:?}")]
    WrongState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The renderer state at the time.
        state: RendererState,
    },

    /// A frame was delivered before a valid stream description was accepted.
    #[error("Protocol violation: frame delivered before a stream was accepted")]
    FrameBeforeAccept,

    /// The clock+clock timestamp policy requires a look-ahead frame.
    #[error("Protocol violation: clock+clock policy invoked without a look-ahead frame")]
    MissingLookahead,

    /// The queue still held frames after stop completed.
    #[error("Protocol violation: {0} frames remained queued after stop")]
    QueueNotDrained(usize),

    /// The sink did not report stopped within the bounded wait.
    #[error("Sink failed to stop within {0} ms")]
    StopTimeout(u64),

    /// A converter was asked to process frames before configuration.
    #[error("Converter has no negotiated stream description")]
    ConverterUnconfigured,

    /// Frame bytes did not match the negotiated layout.
    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSizeMismatch {
        /// Bytes the negotiated layout requires.
        expected: usize,
        /// Bytes the frame actually carried.
        actual: usize,
    },

    /// Geometry incompatible with the converter's alignment rules.
    #[error("Unsupported geometry {width}x{height}: {reason}")]
    UnsupportedGeometry {
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
        /// Which alignment rule failed.
        reason: &'static str,
    },

    /// The wrapped decoder failed.
    #[error("Decoder error: {0}")]
    Decoder(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a negotiation failure.
    pub(crate) fn negotiation(msg: impl Into<String>) -> Self {
        Self::NegotiationFailed(msg.into())
    }

    /// Create a sink error.
    pub(crate) fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Whether this error is a programming-contract violation that must
    /// abort the session.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::WrongState { .. }
                | Self::FrameBeforeAccept
                | Self::MissingLookahead
                | Self::QueueNotDrained(_)
        )
    }
}
