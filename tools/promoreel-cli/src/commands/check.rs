//! Check for the external tools.

use promoreel_common::config::{config_file_path, AppConfig};
use promoreel_render_engine::command_exists;

pub fn run(app_config: &AppConfig) -> anyhow::Result<()> {
    println!("PromoReel System Check");
    println!("{}", "=".repeat(50));
    println!("Config file: {}", config_file_path().display());

    let tools = [
        ("Encoder", &app_config.tools.ffmpeg),
        ("Prober", &app_config.tools.ffprobe),
    ];

    let mut all_ok = true;
    for (label, path) in tools {
        if command_exists(&path.to_string_lossy()) {
            println!("[OK]   {label}: {}", path.display());
        } else {
            println!("[FAIL] {label}: {} not found", path.display());
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("All required tools are available. PromoReel is ready.");
    } else {
        println!("Install ffmpeg or set tools.ffmpeg/tools.ffprobe in the config file.");
    }

    Ok(())
}
