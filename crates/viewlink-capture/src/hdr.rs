//! HDR Mastering Metadata
//!
//! [`HdrMeta`] carries the mastering-display and content-light-level
//! metadata that accompanies an HDR stream: primary chromaticities, white
//! point, mastering luminance range, MaxCLL and MaxFALL.
//!
//! Capture hardware delivers these as floating-point samples that jitter
//! slightly frame to frame even when the underlying signal is stable, so
//! equality is tolerance-based rather than bitwise: chromaticities compare
//! within `1e-4`, luminance values within `1e-3`. Without this, every
//! metadata sample would look like a format change and force a renderer
//! rebuild.
//!
//! # Examples
//!
//! ```rust
//! use viewlink_capture::hdr::HdrMeta;
//!
//! let a = HdrMeta::rec2020_1000_nits();
//! let mut b = a.clone();
//! b.max_mastering_luminance += 0.0005; // below luminance tolerance
//! assert_eq!(a, b);
//! ```

/// Chromaticity fields compare equal within this tolerance.
pub const CHROMATICITY_TOLERANCE: f64 = 1e-4;

/// Luminance and light-level fields compare equal within this tolerance.
pub const LUMINANCE_TOLERANCE: f64 = 1e-3;

/// Upper bound of the CIE-1931 coordinate range accepted from hardware.
const CIE_MAX: f64 = 1.1;

/// HDR mastering-display and content-light metadata.
///
/// All chromaticity coordinates are CIE-1931 xy values in `[0, 1.1]`;
/// luminance values are cd/m².
#[derive(Debug, Clone, Default)]
pub struct HdrMeta {
    /// Red primary x.
    pub red_x: f64,
    /// Red primary y.
    pub red_y: f64,
    /// Green primary x.
    pub green_x: f64,
    /// Green primary y.
    pub green_y: f64,
    /// Blue primary x.
    pub blue_x: f64,
    /// Blue primary y.
    pub blue_y: f64,
    /// White point x.
    pub white_x: f64,
    /// White point y.
    pub white_y: f64,
    /// Mastering display minimum luminance, cd/m².
    pub min_mastering_luminance: f64,
    /// Mastering display maximum luminance, cd/m².
    pub max_mastering_luminance: f64,
    /// Maximum content light level, cd/m².
    pub max_cll: f64,
    /// Maximum frame-average light level, cd/m².
    pub max_fall: f64,
}

impl HdrMeta {
    /// BT.2020 primaries mastered at 1000 nits; a common hardware default.
    #[must_use]
    pub fn rec2020_1000_nits() -> Self {
        Self {
            red_x: 0.708,
            red_y: 0.292,
            green_x: 0.170,
            green_y: 0.797,
            blue_x: 0.131,
            blue_y: 0.046,
            white_x: 0.3127,
            white_y: 0.3290,
            min_mastering_luminance: 0.0001,
            max_mastering_luminance: 1000.0,
            max_cll: 1000.0,
            max_fall: 400.0,
        }
    }

    /// Whether every field is inside its accepted range: chromaticities in
    /// CIE `[0, 1.1]`, luminance and light levels strictly positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let chroma_ok = [
            self.red_x,
            self.red_y,
            self.green_x,
            self.green_y,
            self.blue_x,
            self.blue_y,
            self.white_x,
            self.white_y,
        ]
        .iter()
        .all(|v| (0.0..=CIE_MAX).contains(v));

        chroma_ok
            && self.min_mastering_luminance > 0.0
            && self.max_mastering_luminance > 0.0
            && self.max_cll > 0.0
            && self.max_fall > 0.0
    }
}

fn chroma_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < CHROMATICITY_TOLERANCE
}

fn lum_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < LUMINANCE_TOLERANCE
}

impl PartialEq for HdrMeta {
    fn eq(&self, other: &Self) -> bool {
        chroma_eq(self.red_x, other.red_x)
            && chroma_eq(self.red_y, other.red_y)
            && chroma_eq(self.green_x, other.green_x)
            && chroma_eq(self.green_y, other.green_y)
            && chroma_eq(self.blue_x, other.blue_x)
            && chroma_eq(self.blue_y, other.blue_y)
            && chroma_eq(self.white_x, other.white_x)
            && chroma_eq(self.white_y, other.white_y)
            && lum_eq(self.min_mastering_luminance, other.min_mastering_luminance)
            && lum_eq(self.max_mastering_luminance, other.max_mastering_luminance)
            && lum_eq(self.max_cll, other.max_cll)
            && lum_eq(self.max_fall, other.max_fall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_equality() {
        let a = HdrMeta::rec2020_1000_nits();

        // Chromaticity noise below tolerance
        let mut b = a.clone();
        b.green_x += 0.00005;
        assert_eq!(a, b);

        // Luminance noise below tolerance
        let mut b = a.clone();
        b.max_cll += 0.0005;
        assert_eq!(a, b);

        // Luminance difference at tolerance is a real change
        let mut b = a.clone();
        b.max_mastering_luminance += 0.001;
        assert_ne!(a, b);

        // Chromaticity difference at tolerance is a real change
        let mut b = a.clone();
        b.red_x += 0.0001;
        assert_ne!(a, b);
    }

    #[test]
    fn test_validity() {
        assert!(HdrMeta::rec2020_1000_nits().is_valid());

        // Zero-initialized metadata has non-positive luminance
        assert!(!HdrMeta::default().is_valid());

        let mut bad = HdrMeta::rec2020_1000_nits();
        bad.blue_x = 1.2; // outside CIE range
        assert!(!bad.is_valid());

        let mut bad = HdrMeta::rec2020_1000_nits();
        bad.max_fall = 0.0;
        assert!(!bad.is_valid());
    }
}
