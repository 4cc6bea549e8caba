use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use relief::ReliefTransform;
use std::fs;
use std::path::PathBuf;

/// Extensions of tiles picked up from the input directory.
const TILE_EXTENSIONS: [&str; 2] = ["png", "webp"];

pub fn run(encoding: &str, input: PathBuf, output: PathBuf, elevation: i32) -> Result<()> {
    let transform = ReliefTransform::from_name(encoding)?;

    if !input.is_dir() {
        bail!("Input directory does not exist: {}", input.display());
    }

    // Collect tile files
    let mut tiles: Vec<PathBuf> = fs::read_dir(&input)
        .context("Failed to read input directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| TILE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();

    if tiles.is_empty() {
        println!("No tiles found in: {}", input.display());
        return Ok(());
    }

    tiles.sort();
    fs::create_dir_all(&output).context("Failed to create output directory")?;

    let pb = ProgressBar::new(tiles.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut failed = Vec::new();
    for tile in &tiles {
        let Some(name) = tile.file_name() else {
            continue;
        };

        if let Err(e) = transform.transform_file(tile, output.join(name), elevation) {
            failed.push((tile.clone(), e));
        }

        pb.inc(1);
    }

    pb.finish_with_message("done");

    println!(
        "Transformed {} of {} tiles into: {}",
        tiles.len() - failed.len(),
        tiles.len(),
        output.display()
    );
    for (tile, e) in &failed {
        eprintln!("  {}: {}", tile.display(), e);
    }

    Ok(())
}
