use anyhow::{Context, Result};
use relief::ReliefTransform;
use std::path::{Path, PathBuf};

pub fn run(encoding: &str, input: PathBuf, output: Option<PathBuf>, elevation: i32) -> Result<()> {
    let transform = ReliefTransform::from_name(encoding)?;

    let output_path = output.unwrap_or_else(|| default_output(&input));

    transform
        .transform_file(&input, &output_path, elevation)
        .with_context(|| format!("Failed to transform {}", input.display()))?;

    println!("Output written to: {}", output_path.display());
    Ok(())
}

/// `tiles/12_3639_1612.png` -> `tiles/12_3639_1612_relief.png`
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "tile".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "png".to_string());
    input.with_file_name(format!("{}_relief.{}", stem, ext))
}
