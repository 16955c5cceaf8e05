//! Receive images pushed by the device after each trigger.
//!
//! Run with:
//!   cargo run --example image-stream -- 192.168.0.69:50010

use sensorprims::chunk::ChunkPayload;
use sensorprims::pcic::{connect, ImageStream};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "192.168.0.69:50010".to_string());

    let mut stream = ImageStream::open(connect(addr)?)?;
    eprintln!("Waiting for results (trigger the device)...");

    for frame in stream.by_ref().take(10) {
        let frame = frame?;
        for chunk in &frame.chunks {
            let kind = match &chunk.payload {
                ChunkPayload::Jpeg { image, .. } => format!("jpeg {}x{}", image.width(), image.height()),
                ChunkPayload::Monochrome(image) => format!("mono8 {}x{}", image.width(), image.height()),
                ChunkPayload::Opaque(bytes) => format!("{} bytes", bytes.len()),
            };
            println!("ids={:?} frame={} {kind}", frame.ids, chunk.header.frame_count);
        }
    }
    Ok(())
}
