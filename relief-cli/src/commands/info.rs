use anyhow::{bail, Context, Result};
use relief::ReliefTransform;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InfoResponse {
    tile: String,
    encoding: String,
    width: u32,
    height: u32,
    min_elevation: Option<f64>,
    max_elevation: Option<f64>,
    no_data_pixels: u64,
    threshold: i32,
    flooded_pixels: u64,
    flooded_ratio: f64,
}

pub fn run(encoding: &str, input: PathBuf, elevation: i32, json: bool) -> Result<()> {
    let transform = ReliefTransform::from_name(encoding)?;

    if !input.exists() {
        bail!("Tile not found: {}", input.display());
    }

    let bytes = std::fs::read(&input).context("Failed to read tile")?;
    let summary = transform
        .summarize(&bytes, elevation)
        .context("Failed to decode tile")?;

    if json {
        let response = InfoResponse {
            tile: input.display().to_string(),
            encoding: transform.encoding().to_string(),
            width: summary.width,
            height: summary.height,
            min_elevation: summary.min_elevation,
            max_elevation: summary.max_elevation,
            no_data_pixels: summary.no_data_pixels,
            threshold: elevation,
            flooded_pixels: summary.flooded_pixels,
            flooded_ratio: summary.flooded_ratio(),
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Tile: {}", input.display());
    println!("Encoding: {}", transform.encoding());
    println!(
        "Size: {}x{} ({} pixels, {})",
        summary.width,
        summary.height,
        summary.pixel_count(),
        format_size(bytes.len() as u64)
    );
    println!();

    match (summary.min_elevation, summary.max_elevation) {
        (Some(min), Some(max)) => {
            println!("Min elevation: {:.2}m", min);
            println!("Max elevation: {:.2}m", max);
        }
        _ => println!("No elevation data"),
    }

    if summary.no_data_pixels > 0 {
        let pct = summary.no_data_pixels as f64 / summary.pixel_count() as f64 * 100.0;
        println!("No-data pixels: {} ({:.1}%)", summary.no_data_pixels, pct);
    }

    println!(
        "At or below {}m: {} ({:.1}%)",
        elevation,
        summary.flooded_pixels,
        summary.flooded_ratio() * 100.0
    );

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
