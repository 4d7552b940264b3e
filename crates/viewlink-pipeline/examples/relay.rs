//! End-to-End Relay Example
//!
//! Wires a scripted capture device through a `CaptureSession` into a toy
//! render sink that prints what it receives. Demonstrates the full flow:
//! signal reconciliation, renderer negotiation, frame delivery with
//! timestamps, an HDR-only update, and a mid-stream geometry change that
//! forces a rebuild.
//!
//! # Running
//!
//! ```bash
//! cargo run --example relay
//! ```

use std::sync::Arc;
use std::time::Duration;

use viewlink_capture::clock::ClockTicks;
use viewlink_capture::device::mock::MockDevice;
use viewlink_capture::device::{CaptureDevice, SignalEvent};
use viewlink_capture::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
use viewlink_capture::frame::{FrameBuffer, VideoFrame};
use viewlink_capture::hdr::HdrMeta;
use viewlink_pipeline::config::RendererOptions;
use viewlink_pipeline::error::Result;
use viewlink_pipeline::session::{CaptureSession, DesiredState, SinkFactory};
use viewlink_pipeline::sink::{RenderSink, SinkFormat, SinkFrame, SinkState};
use viewlink_pipeline::timestamp::TimestampPolicy;

/// Sink that prints everything it is handed.
struct PrintSink {
    state: SinkState,
}

impl RenderSink for PrintSink {
    fn negotiate(&mut self, format: &SinkFormat) -> Result<()> {
        println!(
            "sink: negotiated {}x{} {} ({} bytes/frame, matrix {:?})",
            format.width, format.height, format.pixel_format, format.frame_size, format.matrix
        );
        self.state = SinkState::Ready;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.state = SinkState::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state = SinkState::Stopped;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn submit_frame(&mut self, frame: SinkFrame<'_>) -> Result<()> {
        println!(
            "sink: frame start={} stop={:?} ({} bytes)",
            frame.timestamps.start,
            frame.timestamps.stop,
            frame.bytes.len()
        );
        Ok(())
    }

    fn submit_hdr(&mut self, hdr: &viewlink_capture::hdr::HdrMeta) -> Result<()> {
        println!("sink: HDR update (MaxCLL {} nits)", hdr.max_cll);
        Ok(())
    }

    fn state(&self) -> SinkState {
        self.state
    }
}

fn uyvy_frame(mode: DisplayMode, seq: u64, ts: u64) -> VideoFrame {
    let size = PixelFormat::Uyvy8.bytes_per_row(mode.width) * mode.height as usize;
    let bytes: Arc<[u8]> = Arc::from(vec![0x80u8; size].into_boxed_slice());
    VideoFrame::new(FrameBuffer::unmanaged(bytes), seq, ClockTicks(ts))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("viewlink Relay Example");
    println!("======================");

    let factory: SinkFactory = Box::new(|| {
        Box::new(PrintSink {
            state: SinkState::Unbuilt,
        })
    });

    let options = RendererOptions::builder()
        .policy(TimestampPolicy::ClockSmart)
        .queue_max_size(8)
        .frame_offset_ms(0)
        .build();

    // 10MHz capture clock, matching the default presentation timeline
    let session = Arc::new(CaptureSession::new(factory, options, 10_000_000)?);

    let mut device = MockDevice::new();
    device.set_observer(session.clone());
    session.set_desired(DesiredState::Rendering);
    device.start_capture().expect("scripted device starts");

    // The hardware reports the stream piecewise
    let mode = DisplayMode::new(1280, 720, true, 1000, 50_000);
    device.emit_signal(SignalEvent::Lock(LockState::Locked));
    device.emit_signal(SignalEvent::Mode(mode));
    device.emit_signal(SignalEvent::Pixels(PixelFormat::Uyvy8));
    device.emit_signal(SignalEvent::Transfer(Eotf::Sdr));
    device.emit_signal(SignalEvent::Colors(ColorSpace::Rec709));

    // Frames at 50fps on the 10MHz hardware clock
    for seq in 0..4 {
        device.emit_frame(uyvy_frame(mode, seq, 1_000_000 + seq * 200_000));
    }
    std::thread::sleep(Duration::from_millis(100));

    // HDR metadata arriving mid-stream passes through without a rebuild
    device.emit_signal(SignalEvent::Hdr(Some(HdrMeta::rec2020_1000_nits())));

    // A geometry change is rejected by the renderer and forces a rebuild
    let bigger = DisplayMode::new(1920, 1080, true, 1000, 50_000);
    println!("\n-- switching to {bigger} --");
    device.emit_signal(SignalEvent::Mode(bigger));
    for seq in 4..8 {
        device.emit_frame(uyvy_frame(bigger, seq, 1_000_000 + seq * 200_000));
    }
    std::thread::sleep(Duration::from_millis(100));

    session.set_desired(DesiredState::Stopped);
    let status = session.status();
    println!(
        "\ndone: {} renderer sessions, {} frames discarded while not rendering",
        session.rebuild_count(),
        status.discarded_frames
    );
    Ok(())
}
