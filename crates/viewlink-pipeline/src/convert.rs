//! Pixel Format Conversion
//!
//! One converter is selected per negotiated stream description (a closed
//! set of tagged variants rather than per-frame virtual dispatch) and is
//! reconfigured through [`Converter::on_video_state`] whenever the
//! description changes. Frames arriving before configuration are rejected.
//!
//! Variants:
//!
//! - [`Passthrough`]: identity copy for layouts the sink accepts natively.
//! - [`V210ToP010`]: packed 10-bit 4:2:2 → planar 10-in-16-bit 4:2:0,
//!   operating on v210's 6-pixel/16-byte groups. Requires width divisible
//!   by 6 and even height; chroma is averaged vertically across each line
//!   pair.
//! - [`Decoded`]: generic decode path wrapping a stateful
//!   [`VideoDecoder`]. The decoder may need more input before it can emit
//!   a frame; [`ConvertStatus::NeedMoreInput`] is a legitimate non-error
//!   outcome and the caller skips delivery for that call only.

use tracing::debug;

use viewlink_capture::description::StreamDescription;
use viewlink_capture::format::PixelFormat;

use crate::error::{PipelineError, Result};

/// Outcome of one conversion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertStatus {
    /// The output buffer holds a complete frame.
    Produced,
    /// The stateful decoder consumed the input but has nothing to emit
    /// yet; skip delivery for this call only.
    NeedMoreInput,
}

/// Stateful decoder contract for formats that are not a simple reformat.
///
/// Implementations live outside this crate (hardware decoders, software
/// scalers); the pipeline only drives the interface.
pub trait VideoDecoder: Send {
    /// Adopt a new stream description. Called at build and on every
    /// accepted change.
    fn configure(&mut self, description: &StreamDescription) -> Result<()>;

    /// Layout of the frames this decoder emits.
    fn output_format(&self) -> PixelFormat;

    /// Bytes per emitted output frame under the current configuration.
    fn out_frame_size(&self) -> usize;

    /// Feed one captured frame; fills `output` when a frame is emitted.
    fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<ConvertStatus>;
}

/// Identity copy.
#[derive(Debug, Default)]
pub struct Passthrough {
    frame_size: usize,
    format: PixelFormat,
}

impl Passthrough {
    fn reconfigure(&mut self, description: &StreamDescription) {
        self.format = description.pixel_format;
        self.frame_size = description
            .pixel_format
            .bytes_per_frame(description.mode.width, description.mode.height);
    }

    fn convert(&self, input: &[u8], output: &mut Vec<u8>) -> Result<ConvertStatus> {
        if input.len() != self.frame_size {
            return Err(PipelineError::FrameSizeMismatch {
                expected: self.frame_size,
                actual: input.len(),
            });
        }
        output.clear();
        output.extend_from_slice(input);
        Ok(ConvertStatus::Produced)
    }
}

/// Packed 10-bit 4:2:2 (v210) to planar 10-in-16-bit 4:2:0 (P010 layout:
/// full-size luma plane followed by an interleaved half-size UV plane).
#[derive(Debug, Default)]
pub struct V210ToP010 {
    width: usize,
    height: usize,
    src_stride: usize,
}

impl V210ToP010 {
    fn reconfigure(&mut self, description: &StreamDescription) -> Result<()> {
        let width = description.mode.width;
        let height = description.mode.height;
        if width == 0 || width % 6 != 0 {
            return Err(PipelineError::UnsupportedGeometry {
                width,
                height,
                reason: "width must be a positive multiple of 6",
            });
        }
        if height == 0 || height % 2 != 0 {
            return Err(PipelineError::UnsupportedGeometry {
                width,
                height,
                reason: "height must be positive and even",
            });
        }
        self.width = width as usize;
        self.height = height as usize;
        self.src_stride = PixelFormat::V210.bytes_per_row(width);
        Ok(())
    }

    fn out_frame_size(&self) -> usize {
        // 16-bit luma per pixel plus two 16-bit chroma per 2x2 block
        self.width * self.height * 2 + self.width * self.height
    }

    fn convert(&self, input: &[u8], output: &mut Vec<u8>) -> Result<ConvertStatus> {
        let needed = self.src_stride * self.height;
        if input.len() < needed {
            return Err(PipelineError::FrameSizeMismatch {
                expected: needed,
                actual: input.len(),
            });
        }

        let luma_bytes = self.width * self.height * 2;
        output.clear();
        output.resize(self.out_frame_size(), 0);
        let (luma_plane, chroma_plane) = output.split_at_mut(luma_bytes);

        let groups = self.width / 6;
        let mut top = GroupSamples::default();
        let mut bottom = GroupSamples::default();

        for pair in 0..self.height / 2 {
            let row0 = (pair * 2) * self.src_stride;
            let row1 = (pair * 2 + 1) * self.src_stride;

            for g in 0..groups {
                decode_group(&input[row0 + g * 16..row0 + g * 16 + 16], &mut top);
                decode_group(&input[row1 + g * 16..row1 + g * 16 + 16], &mut bottom);

                let x = g * 6;
                write_luma(luma_plane, self.width, pair * 2, x, &top.luma);
                write_luma(luma_plane, self.width, pair * 2 + 1, x, &bottom.luma);

                // 4:2:0 chroma site: average the two source lines
                for site in 0..3 {
                    let cb = (top.cb[site] + bottom.cb[site]) / 2;
                    let cr = (top.cr[site] + bottom.cr[site]) / 2;
                    let idx = (pair * (self.width / 2) + x / 2 + site) * 4;
                    chroma_plane[idx..idx + 2].copy_from_slice(&(cb << 6).to_le_bytes());
                    chroma_plane[idx + 2..idx + 4].copy_from_slice(&(cr << 6).to_le_bytes());
                }
            }
        }

        Ok(ConvertStatus::Produced)
    }
}

/// The 6 luma and 3+3 chroma samples of one 16-byte v210 group.
#[derive(Debug, Default)]
struct GroupSamples {
    luma: [u16; 6],
    cb: [u16; 3],
    cr: [u16; 3],
}

/// Unpack one v210 group: four little-endian words, three 10-bit
/// components each, in the order Cb Y Cr / Y Cb Y / Cr Y Cb / Y Cr Y.
fn decode_group(bytes: &[u8], out: &mut GroupSamples) {
    let mut words = [0u32; 4];
    for (i, word) in words.iter_mut().enumerate() {
        *word = u32::from_le_bytes([
            bytes[i * 4],
            bytes[i * 4 + 1],
            bytes[i * 4 + 2],
            bytes[i * 4 + 3],
        ]);
    }
    let c = |w: u32, shift: u32| -> u16 {
        ((w >> shift) & 0x3ff) as u16
    };

    out.cb[0] = c(words[0], 0);
    out.luma[0] = c(words[0], 10);
    out.cr[0] = c(words[0], 20);

    out.luma[1] = c(words[1], 0);
    out.cb[1] = c(words[1], 10);
    out.luma[2] = c(words[1], 20);

    out.cr[1] = c(words[2], 0);
    out.luma[3] = c(words[2], 10);
    out.cb[2] = c(words[2], 20);

    out.luma[4] = c(words[3], 0);
    out.cr[2] = c(words[3], 10);
    out.luma[5] = c(words[3], 20);
}

/// Store six 10-bit luma samples as MSB-aligned 16-bit words.
fn write_luma(plane: &mut [u8], width: usize, row: usize, x: usize, samples: &[u16; 6]) {
    for (i, &sample) in samples.iter().enumerate() {
        let idx = (row * width + x + i) * 2;
        plane[idx..idx + 2].copy_from_slice(&(sample << 6).to_le_bytes());
    }
}

/// Generic decode path around a stateful [`VideoDecoder`].
pub struct Decoded {
    decoder: Box<dyn VideoDecoder>,
}

impl std::fmt::Debug for Decoded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoded").finish_non_exhaustive()
    }
}

/// Per-session pixel converter, selected once at renderer build.
#[derive(Debug)]
pub enum Converter {
    /// Identity copy.
    Passthrough(Passthrough),
    /// v210 → P010 reformat.
    V210ToP010(V210ToP010),
    /// Wrapped stateful decoder.
    Decoded(Decoded),
}

impl Converter {
    /// Select and configure the variant for `description`.
    ///
    /// A supplied decoder always wins; otherwise v210 streams get the
    /// reformatter and every other known layout passes through.
    pub fn select(
        description: &StreamDescription,
        decoder: Option<Box<dyn VideoDecoder>>,
    ) -> Result<Self> {
        let mut converter = match (decoder, description.pixel_format) {
            (Some(decoder), _) => Converter::Decoded(Decoded { decoder }),
            (None, PixelFormat::V210) => Converter::V210ToP010(V210ToP010::default()),
            (
                None,
                PixelFormat::Uyvy8 | PixelFormat::R210 | PixelFormat::Bgra8 | PixelFormat::P010,
            ) => Converter::Passthrough(Passthrough::default()),
            (None, PixelFormat::Unknown) => {
                return Err(PipelineError::UnsupportedFormat(PixelFormat::Unknown))
            }
        };
        converter.on_video_state(description)?;
        Ok(converter)
    }

    /// Adopt a changed stream description. Frames are rejected until this
    /// has succeeded at least once.
    pub fn on_video_state(&mut self, description: &StreamDescription) -> Result<()> {
        debug!(
            format = %description.pixel_format,
            mode = %description.mode,
            "reconfiguring converter"
        );
        match self {
            Converter::Passthrough(p) => {
                p.reconfigure(description);
                Ok(())
            }
            Converter::V210ToP010(v) => v.reconfigure(description),
            Converter::Decoded(d) => d.decoder.configure(description),
        }
    }

    /// Layout of the frames this converter emits.
    #[must_use]
    pub fn output_format(&self) -> PixelFormat {
        match self {
            Converter::Passthrough(p) => p.format,
            Converter::V210ToP010(_) => PixelFormat::P010,
            Converter::Decoded(d) => d.decoder.output_format(),
        }
    }

    /// Exact bytes one output frame occupies.
    #[must_use]
    pub fn out_frame_size(&self) -> usize {
        match self {
            Converter::Passthrough(p) => p.frame_size,
            Converter::V210ToP010(v) => v.out_frame_size(),
            Converter::Decoded(d) => d.decoder.out_frame_size(),
        }
    }

    /// Transform one captured frame into `output`.
    pub fn format_frame(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<ConvertStatus> {
        if self.out_frame_size() == 0 {
            return Err(PipelineError::ConverterUnconfigured);
        }
        match self {
            Converter::Passthrough(p) => p.convert(input, output),
            Converter::V210ToP010(v) => v.convert(input, output),
            Converter::Decoded(d) => d.decoder.decode(input, output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewlink_capture::format::{ColorSpace, DisplayMode, Eotf, LockState};

    fn description(format: PixelFormat, width: u32, height: u32) -> StreamDescription {
        StreamDescription {
            valid: true,
            lock: LockState::Locked,
            mode: DisplayMode::new(width, height, true, 1000, 60_000),
            pixel_format: format,
            eotf: Eotf::Sdr,
            color_space: ColorSpace::Rec709,
            vertical_flip: false,
            hdr: None,
        }
    }

    /// Encode one v210 group from 6 luma and 3+3 chroma samples.
    fn encode_group(luma: [u32; 6], cb: [u32; 3], cr: [u32; 3]) -> [u8; 16] {
        let words = [
            cb[0] | luma[0] << 10 | cr[0] << 20,
            luma[1] | cb[1] << 10 | luma[2] << 20,
            cr[1] | luma[3] << 10 | cb[2] << 20,
            luma[4] | cr[2] << 10 | luma[5] << 20,
        ];
        let mut out = [0u8; 16];
        for (i, word) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_out_frame_size_1080p() {
        let mut converter = Converter::select(&description(PixelFormat::V210, 1920, 1080), None)
            .expect("select");
        converter
            .on_video_state(&description(PixelFormat::V210, 1920, 1080))
            .expect("reconfigure");
        // One 16-bit luma per pixel, two 16-bit chroma per 2 pixels
        assert_eq!(converter.out_frame_size(), 1920 * 1080 * 2 + 1920 * 1080);
    }

    #[test]
    fn test_v210_alignment_rules() {
        assert!(matches!(
            Converter::select(&description(PixelFormat::V210, 1921, 1080), None),
            Err(PipelineError::UnsupportedGeometry { .. })
        ));
        assert!(matches!(
            Converter::select(&description(PixelFormat::V210, 1920, 1081), None),
            Err(PipelineError::UnsupportedGeometry { .. })
        ));
    }

    #[test]
    fn test_v210_group_reformat() {
        // 6x2 frame: one group per row, no stride padding beyond the group
        let desc = description(PixelFormat::V210, 6, 2);
        let mut converter = Converter::select(&desc, None).expect("select");

        let row0 = encode_group([64, 128, 192, 256, 320, 384], [100, 110, 120], [200, 210, 220]);
        let row1 = encode_group([64, 128, 192, 256, 320, 384], [140, 150, 160], [240, 250, 260]);

        let stride = PixelFormat::V210.bytes_per_row(6);
        let mut input = vec![0u8; stride * 2];
        input[..16].copy_from_slice(&row0);
        input[stride..stride + 16].copy_from_slice(&row1);

        let mut output = Vec::new();
        let status = converter.format_frame(&input, &mut output).expect("convert");
        assert_eq!(status, ConvertStatus::Produced);
        assert_eq!(output.len(), 6 * 2 * 2 + 6 * 2);

        // First luma sample, MSB-aligned
        let y0 = u16::from_le_bytes([output[0], output[1]]);
        assert_eq!(y0, 64 << 6);

        // First chroma site: Cb averaged across the line pair
        let luma_bytes = 6 * 2 * 2;
        let cb = u16::from_le_bytes([output[luma_bytes], output[luma_bytes + 1]]);
        assert_eq!(cb, ((100 + 140) / 2) << 6);
        let cr = u16::from_le_bytes([output[luma_bytes + 2], output[luma_bytes + 3]]);
        assert_eq!(cr, ((200 + 240) / 2) << 6);
    }

    #[test]
    fn test_passthrough_copies() {
        let desc = description(PixelFormat::Uyvy8, 4, 2);
        let mut converter = Converter::select(&desc, None).expect("select");
        assert_eq!(converter.out_frame_size(), 4 * 2 * 2);

        let input = vec![7u8; 16];
        let mut output = Vec::new();
        converter.format_frame(&input, &mut output).expect("convert");
        assert_eq!(output, input);

        // Wrong size is a configuration-class error
        assert!(matches!(
            converter.format_frame(&[0u8; 3], &mut output),
            Err(PipelineError::FrameSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(matches!(
            Converter::select(&description(PixelFormat::Unknown, 1920, 1080), None),
            Err(PipelineError::UnsupportedFormat(PixelFormat::Unknown))
        ));
    }

    /// Decoder that needs two inputs per emitted frame.
    struct TwoInputDecoder {
        pending: bool,
        size: usize,
    }

    impl VideoDecoder for TwoInputDecoder {
        fn configure(&mut self, description: &StreamDescription) -> Result<()> {
            self.size = description.mode.pixel_count() * 4;
            Ok(())
        }
        fn output_format(&self) -> PixelFormat {
            PixelFormat::Bgra8
        }
        fn out_frame_size(&self) -> usize {
            self.size
        }
        fn decode(&mut self, _input: &[u8], output: &mut Vec<u8>) -> Result<ConvertStatus> {
            if self.pending {
                self.pending = false;
                output.clear();
                output.resize(self.size, 0);
                Ok(ConvertStatus::Produced)
            } else {
                self.pending = true;
                Ok(ConvertStatus::NeedMoreInput)
            }
        }
    }

    #[test]
    fn test_decoder_need_more_input_is_not_an_error() {
        let desc = description(PixelFormat::Uyvy8, 2, 2);
        let decoder = Box::new(TwoInputDecoder {
            pending: false,
            size: 0,
        });
        let mut converter = Converter::select(&desc, Some(decoder)).expect("select");

        let mut output = Vec::new();
        let first = converter.format_frame(&[0u8; 8], &mut output).expect("feed");
        assert_eq!(first, ConvertStatus::NeedMoreInput);

        let second = converter.format_frame(&[0u8; 8], &mut output).expect("feed");
        assert_eq!(second, ConvertStatus::Produced);
        assert_eq!(output.len(), converter.out_frame_size());
    }
}
