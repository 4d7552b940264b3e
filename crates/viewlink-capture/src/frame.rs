//! Video Frames and Driver Buffer Ownership
//!
//! Capture drivers own the pixel storage behind every frame; a frame that
//! outlives the capture callback (because it sits in the delivery queue)
//! must keep the driver's buffer alive for exactly as long as it is queued
//! and hand it back exactly once.
//!
//! [`FrameBuffer`] models that contract as a move-only ownership token: the
//! driver pins its storage into the token on frame arrival, and dropping
//! the token fires the driver's release hook once. Pairing is enforced by
//! ownership instead of manual reference counting, so a leaked retain or a
//! double release cannot be expressed.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use viewlink_capture::clock::ClockTicks;
//! use viewlink_capture::frame::{FrameBuffer, VideoFrame};
//!
//! let storage: Arc<[u8]> = Arc::from(vec![0u8; 64].into_boxed_slice());
//! let frame = VideoFrame::new(FrameBuffer::unmanaged(storage), 0, ClockTicks(0));
//! assert_eq!(frame.bytes().len(), 64);
//! ```

use std::sync::Arc;

use crate::clock::ClockTicks;

/// Hook a driver installs to learn when a queued frame's storage is no
/// longer referenced.
///
/// Called exactly once per [`FrameBuffer`], from whichever thread drops the
/// token (the delivery thread on dequeue, or a control thread on purge).
pub trait BufferRelease: Send + Sync {
    /// The buffer in `slot` has been released back to the driver.
    fn release(&self, slot: u32);
}

/// Move-only ownership token over driver-owned pixel bytes.
///
/// Holding the token keeps the storage alive; dropping it releases the
/// driver reference exactly once. The token is deliberately not `Clone`.
pub struct FrameBuffer {
    bytes: Arc<[u8]>,
    slot: u32,
    hook: Option<Arc<dyn BufferRelease>>,
}

impl FrameBuffer {
    /// Token for a driver buffer in `slot`, released through `hook` on drop.
    #[must_use]
    pub fn new(bytes: Arc<[u8]>, slot: u32, hook: Arc<dyn BufferRelease>) -> Self {
        Self {
            bytes,
            slot,
            hook: Some(hook),
        }
    }

    /// Token over storage with no release protocol (tests, synthetic frames).
    #[must_use]
    pub fn unmanaged(bytes: Arc<[u8]>) -> Self {
        Self {
            bytes,
            slot: 0,
            hook: None,
        }
    }

    /// The pixel bytes this token keeps alive.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Driver slot this token refers to.
    #[must_use]
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook.release(self.slot);
        }
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.bytes.len())
            .field("slot", &self.slot)
            .field("managed", &self.hook.is_some())
            .finish()
    }
}

/// One captured frame: buffer token, capture sequence number, and the
/// hardware-clock reading taken at arrival.
#[derive(Debug)]
pub struct VideoFrame {
    buffer: FrameBuffer,
    sequence: u64,
    timestamp: ClockTicks,
}

impl VideoFrame {
    /// Assemble a frame from its buffer token and capture metadata.
    #[must_use]
    pub fn new(buffer: FrameBuffer, sequence: u64, timestamp: ClockTicks) -> Self {
        Self {
            buffer,
            sequence,
            timestamp,
        }
    }

    /// Pixel bytes, valid while the frame (and its token) is alive.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.buffer.bytes()
    }

    /// Monotonically increasing capture sequence counter.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Hardware-clock reading at capture.
    #[must_use]
    pub fn timestamp(&self) -> ClockTicks {
        self.timestamp
    }
}
