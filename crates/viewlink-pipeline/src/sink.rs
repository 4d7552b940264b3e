//! Render Sink Collaborator Contract
//!
//! The downstream display sink (a renderer filter graph, a compositor, a
//! file writer in tests) is consumed through the [`RenderSink`] capability
//! set. A sink accepts one negotiated [`SinkFormat`] at build time and
//! receives converted frames plus live HDR metadata updates while running.
//!
//! [`SinkFormat`] is derived from an accepted stream description with the
//! control layer's forced overrides applied: primaries, transfer function,
//! transfer matrix, and nominal range are each independently overridable,
//! falling back to a value derived from the description when unset.

use serde::{Deserialize, Serialize};

use viewlink_capture::description::StreamDescription;
use viewlink_capture::format::{ColorSpace, Eotf, PixelFormat};
use viewlink_capture::hdr::HdrMeta;

use crate::error::Result;
use crate::timestamp::FrameTimestamps;

/// YCbCr↔RGB transfer matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMatrix {
    /// ITU-R BT.601.
    Bt601,
    /// ITU-R BT.709.
    Bt709,
    /// ITU-R BT.2020 non-constant luminance.
    Bt2020,
}

/// Quantization range of the encoded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalRange {
    /// Studio swing (16-235 for 8-bit luma).
    Limited,
    /// Full swing (0-255 for 8-bit).
    Full,
}

/// Independently overridable output color description.
///
/// Each unset field falls back to a value derived from the negotiated
/// stream description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatOverrides {
    /// Force output primaries.
    pub primaries: Option<ColorSpace>,
    /// Force output transfer function.
    pub eotf: Option<Eotf>,
    /// Force the transfer matrix.
    pub matrix: Option<TransferMatrix>,
    /// Force the nominal range.
    pub range: Option<NominalRange>,
}

/// The format a sink agrees to render, fixed for one renderer session.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in lines.
    pub height: u32,
    /// Progressive scan.
    pub progressive: bool,
    /// Layout of the bytes the sink will receive (converter output).
    pub pixel_format: PixelFormat,
    /// Bytes per delivered frame.
    pub frame_size: usize,
    /// Presentation timeline ticks per second.
    pub timeline_rate: u64,
    /// Nominal frame duration in timeline ticks.
    pub frame_duration: i64,
    /// Output primaries after overrides.
    pub primaries: ColorSpace,
    /// Output transfer function after overrides.
    pub eotf: Eotf,
    /// Transfer matrix after overrides.
    pub matrix: TransferMatrix,
    /// Nominal range after overrides.
    pub range: NominalRange,
    /// Frames must be flipped vertically for display.
    pub vertical_flip: bool,
}

impl SinkFormat {
    /// Derive the output format from an accepted description.
    ///
    /// `pixel_format` and `frame_size` describe the converter's output,
    /// not the capture layout. Unset overrides fall back to
    /// description-derived values; the matrix default follows the color
    /// space and the range defaults to limited, the broadcast convention.
    #[must_use]
    pub fn derive(
        description: &StreamDescription,
        pixel_format: PixelFormat,
        frame_size: usize,
        timeline_rate: u64,
        frame_duration: i64,
        overrides: &FormatOverrides,
    ) -> Self {
        let matrix_default = match description.color_space {
            ColorSpace::Rec601 => TransferMatrix::Bt601,
            ColorSpace::Rec2020 => TransferMatrix::Bt2020,
            ColorSpace::Rec709 | ColorSpace::Unknown => TransferMatrix::Bt709,
        };
        Self {
            width: description.mode.width,
            height: description.mode.height,
            progressive: description.mode.progressive,
            pixel_format,
            frame_size,
            timeline_rate,
            frame_duration,
            primaries: overrides.primaries.unwrap_or(description.color_space),
            eotf: overrides.eotf.unwrap_or(description.eotf),
            matrix: overrides.matrix.unwrap_or(matrix_default),
            range: overrides.range.unwrap_or(NominalRange::Limited),
            vertical_flip: description.vertical_flip,
        }
    }
}

/// Lifecycle state a sink reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Constructed, no format negotiated.
    Unbuilt,
    /// Format accepted, not yet running.
    Ready,
    /// Accepting frames.
    Running,
    /// Stopped cleanly.
    Stopped,
    /// Faulted.
    Failed,
}

/// One converted frame handed to the sink.
#[derive(Debug)]
pub struct SinkFrame<'a> {
    /// Converted pixel bytes, exactly `SinkFormat::frame_size` long.
    pub bytes: &'a [u8],
    /// Presentation times on the negotiated timeline.
    pub timestamps: FrameTimestamps,
}

/// Capability set of a downstream render sink, resolved once at build.
pub trait RenderSink: Send {
    /// Accept or refuse a proposed output format.
    fn negotiate(&mut self, format: &SinkFormat) -> Result<()>;

    /// Begin accepting frames.
    fn start(&mut self) -> Result<()>;

    /// Stop rendering. The sink must reach [`SinkState::Stopped`] within
    /// the renderer's bounded wait.
    fn stop(&mut self) -> Result<()>;

    /// Flush pending frames. Only legal while running.
    fn reset(&mut self) -> Result<()>;

    /// Submit one converted frame.
    fn submit_frame(&mut self, frame: SinkFrame<'_>) -> Result<()>;

    /// Push updated HDR metadata without re-negotiation.
    fn submit_hdr(&mut self, hdr: &HdrMeta) -> Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> SinkState;
}
