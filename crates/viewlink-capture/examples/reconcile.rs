//! Video-State Reconciliation Example
//!
//! This example plays back the kind of partial, out-of-order hardware
//! signal sequence a capture card actually delivers and shows when the
//! reconciler decides the stream is describable.
//!
//! # Running
//!
//! ```bash
//! cargo run --example reconcile
//! ```

use viewlink_capture::device::SignalEvent;
use viewlink_capture::format::{ColorSpace, DisplayMode, Eotf, LockState, PixelFormat};
use viewlink_capture::hdr::HdrMeta;
use viewlink_capture::reconciler::Reconciler;

fn main() {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("viewlink-capture Reconciliation Example");
    println!("=======================================");

    let mut reconciler = Reconciler::new();

    let events = [
        ("lock acquired", SignalEvent::Lock(LockState::Locked)),
        (
            "display mode",
            SignalEvent::Mode(DisplayMode::new(3840, 2160, true, 1001, 60_000)),
        ),
        ("pixel layout", SignalEvent::Pixels(PixelFormat::V210)),
        ("transfer function", SignalEvent::Transfer(Eotf::Pq)),
        ("color space", SignalEvent::Colors(ColorSpace::Rec2020)),
        (
            "HDR metadata",
            SignalEvent::Hdr(Some(HdrMeta::rec2020_1000_nits())),
        ),
    ];

    for (label, event) in events {
        match reconciler.apply(event) {
            Some(description) => {
                println!("{label}: published (valid={})", description.valid);
            }
            None => println!("{label}: accumulated, nothing published"),
        }
    }

    // Signals alone never publish a valid description; a frame must arrive
    match reconciler.note_frame() {
        Some(description) => {
            println!("\nFirst frame completed the picture:");
            println!("  mode:        {}", description.mode);
            println!("  pixels:      {}", description.pixel_format);
            println!("  eotf:        {}", description.eotf);
            println!("  color space: {}", description.color_space);
            println!("  hdr:         {}", description.hdr.is_some());
        }
        None => println!("\nStill not describable"),
    }

    // A mid-stream EOTF change republishes immediately
    if let Some(description) = reconciler.apply(SignalEvent::Transfer(Eotf::Hlg)) {
        println!("\nEOTF change republished: eotf={}", description.eotf);
    }

    // A full reset downgrades to an invalid publication
    if let Some(description) = reconciler.reset() {
        println!("Reset published valid={}", description.valid);
    }
}
