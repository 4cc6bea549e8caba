//! Paint a local elevation tile as a flood overlay.
//!
//! Run with: cargo run --example flood_tile -- <tile.png> <output.png> [encoding] [elevation]

use relief::{ReliefError, ReliefTransform};
use std::env;

fn main() -> Result<(), ReliefError> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: cargo run --example flood_tile -- <tile.png> <output.png> [encoding] [elevation]"
        );
        std::process::exit(1);
    }

    let encoding = args.get(2).map(String::as_str).unwrap_or("mapbox");
    let elevation: i32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);

    // Unknown encodings fail here, before any pixel is read
    let transform = ReliefTransform::from_name(encoding)?;

    let source = std::fs::read(&args[0])?;
    let summary = transform.summarize(&source, elevation)?;

    println!("Tile: {} ({}x{})", args[0], summary.width, summary.height);
    if let (Some(min), Some(max)) = (summary.min_elevation, summary.max_elevation) {
        println!("Elevation range: {:.1}m .. {:.1}m", min, max);
    }
    println!(
        "Below {}m: {:.1}%",
        elevation,
        summary.flooded_ratio() * 100.0
    );

    transform.transform_file(&args[0], &args[1], elevation)?;
    println!("Overlay written to {}", args[1]);

    Ok(())
}
