//! Show container and stream information.

use std::path::PathBuf;

use aimtune_frame_source::probe_video;
use anyhow::Context;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let info = probe_video(&path).with_context(|| format!("Failed to probe {}", path.display()))?;

    println!("Video: {}", info.path.display());
    println!("  Resolution: {}x{}", info.width, info.height);
    match info.fps {
        Some(fps) => println!("  Frame rate: {fps:.3} fps"),
        None => println!("  Frame rate: unknown"),
    }
    if let Some(duration) = info.duration_secs {
        println!("  Duration: {duration:.2}s");
    }
    if let Some(frames) = info.frame_count {
        println!("  Frames: {frames}");
    }
    if let Some(codec) = &info.codec {
        println!("  Codec: {codec}");
    }
    Ok(())
}
