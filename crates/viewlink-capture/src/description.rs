//! Stream Description Snapshots
//!
//! A [`StreamDescription`] is the single consistent answer to "what is the
//! hardware sending right now": geometry, pixel layout, transfer function,
//! color space, orientation, and optional HDR metadata. The reconciler is
//! the only producer; it replaces the whole value on any change rather than
//! mutating fields, so every consumer holds an immutable snapshot.
//!
//! An *invalid* description (`valid == false`) is a real publication, not a
//! missing one: it tells the renderer the previous stream no longer exists
//! and a rebuild will be needed once the signal settles.

use crate::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
use crate::hdr::HdrMeta;

/// Immutable snapshot of the current video stream's properties.
///
/// Invariant: when `valid` is true, every non-HDR field holds a known
/// (non-`Unknown`) value, and a present [`HdrMeta`] passes
/// [`HdrMeta::is_valid`]. [`is_internally_consistent`](Self::is_internally_consistent)
/// checks exactly this contract.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescription {
    /// Whether the stream is currently describable at all.
    pub valid: bool,
    /// Capture-lock status at publication time.
    pub lock: LockState,
    /// Frame geometry and time-base.
    pub mode: DisplayMode,
    /// Packed pixel layout.
    pub pixel_format: PixelFormat,
    /// Transfer function.
    pub eotf: Eotf,
    /// Color space / gamut.
    pub color_space: ColorSpace,
    /// Frames arrive bottom-up and must be flipped for display.
    pub vertical_flip: bool,
    /// HDR mastering metadata when the stream carries any.
    pub hdr: Option<HdrMeta>,
}

impl StreamDescription {
    /// The mandatory "stream went away" publication.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            valid: false,
            lock: LockState::Unknown,
            mode: DisplayMode::new(0, 0, true, 0, 0),
            pixel_format: PixelFormat::Unknown,
            eotf: Eotf::Unknown,
            color_space: ColorSpace::Unknown,
            vertical_flip: false,
            hdr: None,
        }
    }

    /// Verify the validity contract.
    #[must_use]
    pub fn is_internally_consistent(&self) -> bool {
        if !self.valid {
            return true;
        }
        let fields_known = self.lock.is_known()
            && self.pixel_format.is_known()
            && self.eotf.is_known()
            && self.color_space.is_known()
            && self.mode.width > 0
            && self.mode.height > 0
            && self.mode.frame_duration > 0
            && self.mode.time_scale > 0;
        let hdr_ok = self.hdr.as_ref().map_or(true, HdrMeta::is_valid);
        fields_known && hdr_ok
    }

    /// Whether `other` differs only in HDR metadata, the one change a
    /// renderer can absorb without a rebuild.
    #[must_use]
    pub fn differs_only_in_hdr(&self, other: &Self) -> bool {
        self.valid == other.valid
            && self.mode == other.mode
            && self.pixel_format == other.pixel_format
            && self.eotf == other.eotf
            && self.color_space == other.color_space
            && self.vertical_flip == other.vertical_flip
            && self.hdr != other.hdr
    }
}

impl Default for StreamDescription {
    fn default() -> Self {
        Self::invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_description() -> StreamDescription {
        StreamDescription {
            valid: true,
            lock: LockState::Locked,
            mode: DisplayMode::new(1920, 1080, true, 1000, 60_000),
            pixel_format: PixelFormat::V210,
            eotf: Eotf::Pq,
            color_space: ColorSpace::Rec2020,
            vertical_flip: false,
            hdr: Some(HdrMeta::rec2020_1000_nits()),
        }
    }

    #[test]
    fn test_invalid_is_consistent() {
        assert!(StreamDescription::invalid().is_internally_consistent());
    }

    #[test]
    fn test_valid_requires_known_fields() {
        let desc = valid_description();
        assert!(desc.is_internally_consistent());

        let mut broken = desc.clone();
        broken.eotf = Eotf::Unknown;
        assert!(!broken.is_internally_consistent());

        let mut broken = desc.clone();
        broken.mode.width = 0;
        assert!(!broken.is_internally_consistent());
    }

    #[test]
    fn test_valid_requires_valid_hdr() {
        let mut desc = valid_description();
        let mut hdr = HdrMeta::rec2020_1000_nits();
        hdr.max_cll = 0.0;
        desc.hdr = Some(hdr);
        assert!(!desc.is_internally_consistent());

        // HDR metadata is optional; absence is fine
        desc.hdr = None;
        assert!(desc.is_internally_consistent());
    }

    #[test]
    fn test_differs_only_in_hdr() {
        let a = valid_description();

        let mut b = a.clone();
        b.hdr = Some(HdrMeta {
            max_cll: 4000.0,
            ..HdrMeta::rec2020_1000_nits()
        });
        assert!(a.differs_only_in_hdr(&b));

        let mut c = a.clone();
        c.mode.width = 3840;
        assert!(!a.differs_only_in_hdr(&c));

        // Identical descriptions do not count as an HDR change
        assert!(!a.differs_only_in_hdr(&a.clone()));
    }
}
