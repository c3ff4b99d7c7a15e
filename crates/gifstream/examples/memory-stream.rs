//! Decode a GIF that arrives in small scripted chunks and print each frame.
//!
//! Run with: `cargo run -p gifstream --example memory-stream`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gifstream::codec::{GifWriter, GraphicControl, ImageDescriptor, Palette};
use gifstream::sched::NetworkConfig;
use gifstream::session::{Presenter, SessionConfig, SessionId, SessionOutcome};
use gifstream::transport::{MemoryTransport, Script};
use gifstream::Runtime;

struct Printer {
    frames: AtomicU64,
}

impl Presenter for Printer {
    fn deliver_frame(&self, canvas: &[u32], width: u16, height: u16, session: SessionId) {
        let n = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        println!("{session} frame {n}: {width}x{height}");
        for row in canvas.chunks(usize::from(width)) {
            let line: Vec<String> = row.iter().map(|px| format!("{:06x}", px & 0x00FF_FFFF)).collect();
            println!("  {}", line.join(" "));
        }
    }

    fn session_ended(&self, session: SessionId, attempt: u64, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Completed(summary) => {
                println!("{session} attempt {attempt} completed: {summary:?}")
            }
            SessionOutcome::Failed(err) => println!("{session} attempt {attempt} failed: {err}"),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let palette = Palette::from_rgb([[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]])?;
    let gif = GifWriter::with_global_palette(3, 2, &palette)
        .loop_count(0)
        .graphic_control(GraphicControl::default().with_delay(20))
        .image(ImageDescriptor::new(0, 0, 3, 2), None, &[0, 1, 2, 2, 1, 0], 2)?
        .graphic_control(GraphicControl::default().with_delay(20).with_transparent(3))
        .image(ImageDescriptor::new(1, 0, 2, 2), None, &[3, 3, 3, 3], 2)?
        .image(ImageDescriptor::new(0, 1, 3, 1), None, &[3, 3, 3], 2)?
        .finish();

    // Three bytes per step so the parser suspends mid-block.
    let engine = MemoryTransport::new().with_script("demo.gif", Script::chunked(gif, 3));
    let runtime = Runtime::start(engine, NetworkConfig::default())?;

    let printer = Arc::new(Printer {
        frames: AtomicU64::new(0),
    });
    let driver = runtime.driver(printer, SessionConfig::default().with_max_sessions(2));
    let handle = driver.start("demo.gif");
    if !handle.wait_timeout(Duration::from_secs(10)) {
        eprintln!("stream did not finish in time");
    }

    runtime.shutdown()?;
    Ok(())
}
