//! Frame Delivery Queue
//!
//! Decouples the capture callback, which must return quickly, from the
//! delivery thread that performs conversion and sink hand-off. The queue
//! is bounded; when capture outruns delivery it sheds load by policy
//! rather than growing:
//!
//! - **Drop-stale**: a pushed frame first evicts any queued frames whose
//!   capture timestamp is not older than its own. Surviving contents are
//!   therefore always strictly increasing in timestamp, which is what
//!   guarantees in-order sink delivery.
//! - **Drop-oldest**: the head is evicted until the configured bound holds.
//!
//! Every eviction, including the ones a [`reset`](FrameQueue::reset)
//! performs, counts on `dropped_count` and releases the frame's driver
//! buffer token by dropping it.
//!
//! All mutation happens under one mutex; a condvar signaled on push lets
//! the delivery thread block instead of polling. Conversion and sink
//! hand-off never run under the lock.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use viewlink_capture::clock::ClockTicks;
use viewlink_capture::frame::VideoFrame;

use crate::error::{PipelineError, Result};

/// Default bound when none is configured.
pub const DEFAULT_MAX_SIZE: usize = 4;

struct Inner {
    frames: VecDeque<VideoFrame>,
    max_size: usize,
    dropped: u64,
    pushed: u64,
}

impl Inner {
    fn drop_frame(&mut self, frame: VideoFrame) {
        self.dropped += 1;
        // Dropping the frame releases its driver buffer token
        drop(frame);
    }
}

/// Bounded, mutex-protected buffer between capture and delivery.
pub struct FrameQueue {
    inner: Mutex<Inner>,
    available: Condvar,
}

impl FrameQueue {
    /// Queue bounded at `max_size` frames (`max_size >= 1`).
    pub fn new(max_size: usize) -> Result<Self> {
        if max_size < 1 {
            return Err(PipelineError::InvalidQueueSize(max_size));
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(max_size),
                max_size,
                dropped: 0,
                pushed: 0,
            }),
            available: Condvar::new(),
        })
    }

    /// Append a frame, applying the drop-stale then drop-oldest policy.
    ///
    /// Called from the capture callback thread; holds the lock only for
    /// queue mutation.
    pub fn push(&self, frame: VideoFrame) {
        let mut inner = self.inner.lock();

        // Drop-stale: evict trailing frames that are not older than the
        // incoming one (late or duplicate capture timestamps)
        while inner
            .frames
            .back()
            .map_or(false, |tail| tail.timestamp() >= frame.timestamp())
        {
            let stale = inner.frames.pop_back().expect("back checked");
            trace!(ts = stale.timestamp().0, "evicting stale frame");
            inner.drop_frame(stale);
        }

        // Drop-oldest: enforce the bound before appending
        while inner.frames.len() >= inner.max_size {
            let oldest = inner.frames.pop_front().expect("len checked");
            trace!(ts = oldest.timestamp().0, "evicting oldest frame");
            inner.drop_frame(oldest);
        }

        inner.frames.push_back(frame);
        inner.pushed += 1;
        drop(inner);
        self.available.notify_one();
    }

    /// Take the oldest frame, with the next frame's timestamp when one is
    /// queued behind it.
    ///
    /// With `need_lookahead`, the last remaining frame is withheld until a
    /// second frame arrives, so policies that derive a stop time from the
    /// next start always have one to look at.
    pub fn pop(&self, need_lookahead: bool) -> Option<(VideoFrame, Option<ClockTicks>)> {
        let mut inner = self.inner.lock();
        if need_lookahead && inner.frames.len() < 2 {
            return None;
        }
        let frame = inner.frames.pop_front()?;
        let lookahead = inner.frames.front().map(VideoFrame::timestamp);
        Some((frame, lookahead))
    }

    /// Block until a pop under the current policy could succeed, or the
    /// timeout lapses. Returns whether frames are available.
    pub fn wait_for_frame(&self, need_lookahead: bool, timeout: Duration) -> bool {
        let min_depth = if need_lookahead { 2 } else { 1 };
        let mut inner = self.inner.lock();
        if inner.frames.len() >= min_depth {
            return true;
        }
        let _ = self.available.wait_for(&mut inner, timeout);
        inner.frames.len() >= min_depth
    }

    /// Change the bound (`max_size >= 1`), evicting from the head until it
    /// holds.
    pub fn set_max_size(&self, max_size: usize) -> Result<()> {
        if max_size < 1 {
            return Err(PipelineError::InvalidQueueSize(max_size));
        }
        let mut inner = self.inner.lock();
        inner.max_size = max_size;
        while inner.frames.len() > max_size {
            let oldest = inner.frames.pop_front().expect("len checked");
            inner.drop_frame(oldest);
        }
        Ok(())
    }

    /// Purge everything and zero the pushed-frame counter.
    ///
    /// Used whenever the renderer restarts. Each purged frame counts as
    /// dropped and releases its buffer token.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let purged = inner.frames.len();
        while let Some(frame) = inner.frames.pop_front() {
            inner.drop_frame(frame);
        }
        inner.pushed = 0;
        if purged > 0 {
            debug!(purged, "queue reset");
        }
        // Wake the delivery thread so it can observe shutdown conditions
        self.available.notify_all();
    }

    /// Frames currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total frames evicted since construction.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().dropped
    }

    /// Frames pushed since construction or the last reset.
    #[must_use]
    pub fn pushed_total(&self) -> u64 {
        self.inner.lock().pushed
    }

    /// Configured bound.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }
}
