//! Video-State Reconciler
//!
//! Capture hardware never says "here is the stream" in one breath. Lock
//! status, geometry, pixel layout, transfer function, color space, and HDR
//! metadata each arrive on their own schedule, and a frame may show up
//! before or after any of them. The [`Reconciler`] accumulates these
//! partial signals and publishes a [`StreamDescription`] snapshot only when
//! the whole picture is internally consistent.
//!
//! Publication rules:
//!
//! - `valid_now = frame_seen && all_channels_set`
//! - A snapshot is published whenever validity flips, or whenever any field
//!   changes while the stream is already valid.
//! - A downgrade to invalid is published too: consumers must treat the
//!   transient `valid == false` snapshot as mandatory, since it is their
//!   only notice that the previous description is dead.
//!
//! # Examples
//!
//! ```rust
//! use viewlink_capture::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
//! use viewlink_capture::device::SignalEvent;
//! use viewlink_capture::reconciler::Reconciler;
//!
//! let mut reconciler = Reconciler::new();
//! reconciler.apply(SignalEvent::Lock(LockState::Locked));
//! reconciler.apply(SignalEvent::Mode(DisplayMode::new(1920, 1080, true, 1000, 60_000)));
//! reconciler.apply(SignalEvent::Pixels(PixelFormat::V210));
//! reconciler.apply(SignalEvent::Transfer(Eotf::Pq));
//! reconciler.apply(SignalEvent::Colors(ColorSpace::Rec2020));
//! // All channels set, but no frame seen yet: nothing published
//! let published = reconciler.note_frame().expect("first frame completes the picture");
//! assert!(published.valid);
//! ```

use tracing::{debug, warn};

use crate::description::StreamDescription;
use crate::device::SignalEvent;
use crate::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
use crate::hdr::HdrMeta;

/// NTSC active line count that triggers the known bad BT.601 report.
const GLITCH_LINES_486: u32 = 486;

/// Accumulates partial hardware signals into publishable stream
/// descriptions.
///
/// Not internally synchronized: callers serialize `apply`/`note_frame`
/// with renderer renegotiation under one session lock, which also keeps
/// publications in arrival order.
#[derive(Debug, Default)]
pub struct Reconciler {
    lock: Option<LockState>,
    mode: Option<DisplayMode>,
    pixel_format: Option<PixelFormat>,
    eotf: Option<Eotf>,
    color_space: Option<ColorSpace>,
    hdr: Option<HdrMeta>,
    vertical_flip: bool,
    frame_seen: bool,
    last_published: Option<StreamDescription>,
}

impl Reconciler {
    /// Fresh reconciler with every channel unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one hardware signal in; returns a snapshot when one must be
    /// published.
    pub fn apply(&mut self, event: SignalEvent) -> Option<StreamDescription> {
        match event {
            SignalEvent::Lock(lock) => self.lock = Some(lock),
            SignalEvent::Mode(mode) => self.mode = Some(mode),
            SignalEvent::Pixels(format) => self.pixel_format = Some(format),
            SignalEvent::Transfer(eotf) => self.eotf = Some(eotf),
            SignalEvent::Colors(space) => self.color_space = Some(space),
            SignalEvent::Hdr(hdr) => self.hdr = hdr,
        }
        self.publish_if_changed()
    }

    /// Record that a frame arrived; the first one may complete the picture.
    pub fn note_frame(&mut self) -> Option<StreamDescription> {
        self.frame_seen = true;
        self.publish_if_changed()
    }

    /// Clear every channel back to unset, e.g. after a detected format
    /// change. Returns the mandatory invalid publication if the stream was
    /// previously valid.
    pub fn reset(&mut self) -> Option<StreamDescription> {
        let was_valid = self
            .last_published
            .as_ref()
            .map_or(false, |d| d.valid);

        *self = Self::default();

        if was_valid {
            debug!("reconciler reset while valid, publishing invalid snapshot");
            let invalid = StreamDescription::invalid();
            self.last_published = Some(invalid.clone());
            Some(invalid)
        } else {
            None
        }
    }

    /// The most recently published snapshot, if any.
    #[must_use]
    pub fn last_published(&self) -> Option<&StreamDescription> {
        self.last_published.as_ref()
    }

    /// Whether the accumulated state describes a stream right now.
    #[must_use]
    pub fn is_valid_now(&self) -> bool {
        self.frame_seen && self.all_channels_set()
    }

    fn all_channels_set(&self) -> bool {
        // HDR metadata is optional and does not gate validity. A channel
        // reporting its Unknown sentinel counts as unset.
        self.lock.map_or(false, LockState::is_known)
            && self.mode.is_some()
            && self.pixel_format.map_or(false, PixelFormat::is_known)
            && self.eotf.map_or(false, Eotf::is_known)
            && self.effective_color_space().is_known()
    }

    fn publish_if_changed(&mut self) -> Option<StreamDescription> {
        let valid_now = self.is_valid_now();
        let was_valid = self
            .last_published
            .as_ref()
            .map_or(false, |d| d.valid);

        let candidate = if valid_now {
            self.snapshot()
        } else {
            StreamDescription::invalid()
        };

        let must_publish = if valid_now != was_valid {
            true
        } else if valid_now {
            // Field change while already valid
            self.last_published.as_ref() != Some(&candidate)
        } else {
            false
        };

        if !must_publish {
            return None;
        }

        debug!(valid = candidate.valid, "publishing stream description");
        self.last_published = Some(candidate.clone());
        Some(candidate)
    }

    fn snapshot(&self) -> StreamDescription {
        // all_channels_set() held when this is called
        let mode = self.mode.unwrap_or_else(|| DisplayMode::new(0, 0, true, 0, 0));

        StreamDescription {
            valid: true,
            lock: self.lock.unwrap_or(LockState::Unknown),
            mode,
            pixel_format: self.pixel_format.unwrap_or(PixelFormat::Unknown),
            eotf: self.eotf.unwrap_or(Eotf::Unknown),
            color_space: self.effective_color_space(),
            vertical_flip: self.vertical_flip,
            hdr: self.hdr.clone(),
        }
    }

    /// Known hardware glitch: some cards report BT.601 for 486-line NTSC
    /// modes where the sample is meaningless. Translate to unknown rather
    /// than surface it; the channel then reads as unset until the hardware
    /// re-reports something usable.
    fn effective_color_space(&self) -> ColorSpace {
        match (self.color_space, self.mode) {
            (Some(ColorSpace::Rec601), Some(mode)) if mode.height == GLITCH_LINES_486 => {
                warn!("ignoring BT.601 report on 486-line mode");
                ColorSpace::Unknown
            }
            (Some(space), _) => space,
            (None, _) => ColorSpace::Unknown,
        }
    }
}
