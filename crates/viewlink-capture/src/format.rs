//! Pixel Formats, Color Model, and Display Geometry
//!
//! Enumerations for the stream properties the capture hardware reports
//! through independent channels: pixel layout, transfer function (EOTF),
//! color space, capture lock, and display-mode geometry with its rational
//! time-base.
//!
//! Each enum carries an explicit `Unknown` member. `Unknown` is a first
//! class value here: the reconciler publishes a stream description as valid
//! only once every channel has reported something better.
//!
//! # Examples
//!
//! ```rust
//! use viewlink_capture::format::{ColorSpace, DisplayMode, PixelFormat};
//!
//! let mode = DisplayMode::new(1920, 1080, true, 1001, 60_000);
//! assert!((mode.refresh_rate_hz() - 59.94).abs() < 0.01);
//!
//! // v210 rows are padded to 48-pixel groups
//! assert_eq!(PixelFormat::V210.bytes_per_row(1920), 5120);
//!
//! let prim = ColorSpace::Rec709.primaries().expect("known space");
//! assert!((prim.white.0 - 0.3127).abs() < 1e-4);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Packed pixel layout of a video frame.
///
/// Capture hardware reports the first four; `P010` only appears on the
/// delivery side as a converter output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit 4:2:2 packed (UYVY ordering), 2 pixels per 4 bytes.
    Uyvy8,
    /// 10-bit 4:2:2 packed (v210), 6 pixels per 16 bytes, rows padded to
    /// 48-pixel / 128-byte groups.
    V210,
    /// 10-bit RGB packed (r210), 1 pixel per 4 bytes.
    R210,
    /// 8-bit BGRA, 1 pixel per 4 bytes.
    Bgra8,
    /// 10-in-16-bit 4:2:0 planar (full luma plane + interleaved half-size
    /// chroma plane).
    P010,
    /// Not yet reported or unrecognized.
    #[default]
    Unknown,
}

impl PixelFormat {
    /// Nominal bits per pixel for bandwidth estimates.
    #[must_use]
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Uyvy8 => 16,
            PixelFormat::V210 => 20,
            PixelFormat::R210 | PixelFormat::Bgra8 => 32,
            PixelFormat::P010 => 24,
            PixelFormat::Unknown => 0,
        }
    }

    /// Packed row size in bytes for a row of `width` pixels, including any
    /// layout-mandated padding.
    #[must_use]
    pub fn bytes_per_row(self, width: u32) -> usize {
        let width = width as usize;
        match self {
            PixelFormat::Uyvy8 => width * 2,
            // Rows are stored in 48-pixel groups of 128 bytes.
            PixelFormat::V210 => width.div_ceil(48) * 128,
            PixelFormat::R210 | PixelFormat::Bgra8 => width * 4,
            // Luma row; the chroma plane follows at half height
            PixelFormat::P010 => width * 2,
            PixelFormat::Unknown => 0,
        }
    }

    /// Total packed bytes of one frame, including the chroma plane for
    /// planar layouts.
    #[must_use]
    pub fn bytes_per_frame(self, width: u32, height: u32) -> usize {
        let plane = self.bytes_per_row(width) * height as usize;
        match self {
            // Interleaved half-height chroma plane after the luma plane
            PixelFormat::P010 => plane + plane / 2,
            _ => plane,
        }
    }

    /// Whether this value names a concrete layout.
    #[must_use]
    pub fn is_known(self) -> bool {
        self != PixelFormat::Unknown
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Uyvy8 => "UYVY 8-bit 4:2:2",
            PixelFormat::V210 => "v210 10-bit 4:2:2",
            PixelFormat::R210 => "r210 10-bit RGB",
            PixelFormat::Bgra8 => "BGRA 8-bit",
            PixelFormat::P010 => "P010 10-bit 4:2:0",
            PixelFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Electro-optical transfer function of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Eotf {
    /// Standard-dynamic-range gamma.
    Sdr,
    /// Perceptual quantizer (SMPTE ST 2084).
    Pq,
    /// Hybrid log-gamma.
    Hlg,
    /// Not yet reported or unrecognized.
    #[default]
    Unknown,
}

impl Eotf {
    /// Whether this value names a concrete transfer function.
    #[must_use]
    pub fn is_known(self) -> bool {
        self != Eotf::Unknown
    }
}

impl fmt::Display for Eotf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Eotf::Sdr => "SDR",
            Eotf::Pq => "PQ",
            Eotf::Hlg => "HLG",
            Eotf::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A CIE-1931 xy chromaticity coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xy(pub f64, pub f64);

/// Primary and white-point chromaticities for a color space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chromaticities {
    pub red: Xy,
    pub green: Xy,
    pub blue: Xy,
    pub white: Xy,
}

/// Color space (gamut) of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    /// ITU-R BT.601 (SD).
    Rec601,
    /// ITU-R BT.709 (HD).
    Rec709,
    /// ITU-R BT.2020 (UHD / wide gamut).
    Rec2020,
    /// Not yet reported or unrecognized.
    #[default]
    Unknown,
}

impl ColorSpace {
    /// CIE-1931 primaries and white point, when the space is known.
    ///
    /// All three known spaces share the D65 white point.
    #[must_use]
    pub fn primaries(self) -> Option<Chromaticities> {
        const D65: Xy = Xy(0.3127, 0.3290);
        match self {
            ColorSpace::Rec601 => Some(Chromaticities {
                red: Xy(0.630, 0.340),
                green: Xy(0.310, 0.595),
                blue: Xy(0.155, 0.070),
                white: D65,
            }),
            ColorSpace::Rec709 => Some(Chromaticities {
                red: Xy(0.640, 0.330),
                green: Xy(0.300, 0.600),
                blue: Xy(0.150, 0.060),
                white: D65,
            }),
            ColorSpace::Rec2020 => Some(Chromaticities {
                red: Xy(0.708, 0.292),
                green: Xy(0.170, 0.797),
                blue: Xy(0.131, 0.046),
                white: D65,
            }),
            ColorSpace::Unknown => None,
        }
    }

    /// Whether this value names a concrete color space.
    #[must_use]
    pub fn is_known(self) -> bool {
        self != ColorSpace::Unknown
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorSpace::Rec601 => "BT.601",
            ColorSpace::Rec709 => "BT.709",
            ColorSpace::Rec2020 => "BT.2020",
            ColorSpace::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Capture-lock channel: whether the hardware sees a stable input signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockState {
    /// Input locked to a stable signal.
    Locked,
    /// No usable signal on the selected input.
    NoLock,
    /// Not yet reported.
    #[default]
    Unknown,
}

impl LockState {
    /// Whether this value names a concrete lock status.
    #[must_use]
    pub fn is_known(self) -> bool {
        self != LockState::Unknown
    }
}

/// Frame geometry and time-base of a display mode.
///
/// The time-base is the rational `frame_duration / time_scale` seconds per
/// frame, matching how capture hardware reports it (e.g. 1001/60000 for
/// 59.94 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayMode {
    /// Active width in pixels.
    pub width: u32,
    /// Active height in lines.
    pub height: u32,
    /// Progressive scan; interlaced modes carry `false` but are not
    /// rendered field-based.
    pub progressive: bool,
    /// Numerator of the per-frame duration, in `time_scale` units.
    pub frame_duration: u32,
    /// Ticks per second of the mode's time-base.
    pub time_scale: u32,
}

impl DisplayMode {
    /// Create a display mode from geometry and rational time-base.
    #[must_use]
    pub fn new(
        width: u32,
        height: u32,
        progressive: bool,
        frame_duration: u32,
        time_scale: u32,
    ) -> Self {
        Self {
            width,
            height,
            progressive,
            frame_duration,
            time_scale,
        }
    }

    /// Frames per second as a floating-point rate.
    #[must_use]
    pub fn refresh_rate_hz(&self) -> f64 {
        if self.frame_duration == 0 {
            return 0.0;
        }
        f64::from(self.time_scale) / f64::from(self.frame_duration)
    }

    /// Nominal frame duration expressed in ticks of a clock running at
    /// `clock_rate` ticks per second.
    #[must_use]
    pub fn frame_duration_ticks(&self, clock_rate: u64) -> u64 {
        if self.time_scale == 0 {
            return 0;
        }
        u128::from(clock_rate)
            .saturating_mul(u128::from(self.frame_duration))
            .checked_div(u128::from(self.time_scale))
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0)
    }

    /// Total pixels per frame.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}{} @ {:.3}",
            self.width,
            self.height,
            if self.progressive { "p" } else { "i" },
            self.refresh_rate_hz()
        )
    }
}
