//! Check system capabilities.

use aimtune_common::config::config_file_path;
use aimtune_frame_source::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("AimTune System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;
    for (binary, purpose) in [("ffmpeg", "video decoding"), ("ffprobe", "video probing")] {
        if command_exists(binary) {
            println!("[OK] {binary} ({purpose})");
        } else {
            ready = false;
            println!("[MISSING] {binary} ({purpose}): install ffmpeg and make sure it is on PATH");
        }
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!(
            "[INFO] No config at {}, defaults apply (`aimtune config init` writes one)",
            config_path.display()
        );
    }

    println!();
    if ready {
        println!("Video analysis is available.");
    } else {
        println!("Only image-sequence directories can be analyzed until ffmpeg is installed.");
    }

    Ok(())
}
