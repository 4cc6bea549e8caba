//! Threshold classification of elevation tiles.
//!
//! [`ReliefTransform`] decodes an encoded terrain tile, decodes every pixel to
//! an elevation with the configured [`Encoding`], and repaints the tile as a
//! flood overlay:
//!
//! - elevation `<=` threshold: opaque blue `(0, 0, 255, 255)`
//! - elevation `>` threshold: alpha `0`, color channels untouched
//!
//! The result is re-encoded in the container format of the input.
//!
//! Pixels carrying the GSI no-data value are compared like any other
//! elevation, so they are painted blue for every threshold above `-99999`.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;

use crate::encoding::{Encoding, HeightFn, NO_DATA};
use crate::error::{ReliefError, Result};

/// Color of a pixel classified as flooded.
pub const FLOODED: [u8; 4] = [0, 0, 255, 255];

/// Elevation statistics of a tile, computed without modifying it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileSummary {
    /// Tile width in pixels.
    pub width: u32,
    /// Tile height in pixels.
    pub height: u32,
    /// Lowest elevation, ignoring no-data pixels.
    pub min_elevation: Option<f64>,
    /// Highest elevation, ignoring no-data pixels.
    pub max_elevation: Option<f64>,
    /// Number of pixels decoding to the no-data value.
    pub no_data_pixels: u64,
    /// Number of pixels that would be painted as flooded.
    pub flooded_pixels: u64,
}

impl TileSummary {
    /// Total number of pixels in the tile.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Fraction of flooded pixels (0.0 to 1.0).
    ///
    /// Returns 0.0 for an empty tile.
    pub fn flooded_ratio(&self) -> f64 {
        let total = self.pixel_count();
        if total == 0 {
            0.0
        } else {
            self.flooded_pixels as f64 / total as f64
        }
    }
}

/// Flood overlay transform bound to one elevation encoding.
///
/// The encoding is resolved once, at construction; the threshold is passed to
/// every call so a single transform can serve any number of concurrent
/// requests.
///
/// # Example
///
/// ```ignore
/// use relief::ReliefTransform;
///
/// let transform = ReliefTransform::from_name("mapbox")?;
/// let overlay = transform.transform(&png_bytes, 5)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ReliefTransform {
    encoding: Encoding,
    height: HeightFn,
}

impl ReliefTransform {
    /// Create a transform for the given encoding.
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            height: encoding.height_fn(),
        }
    }

    /// Create a transform from an encoding identifier (`gsi`, `gsj`, `mapbox`, `terrarium`).
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::UnsupportedEncoding`] for unknown identifiers.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    /// The encoding used to decode pixels.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Classify a single `[r, g, b, a]` pixel against `threshold` meters.
    pub fn classify(&self, pixel: [u8; 4], threshold: i32) -> [u8; 4] {
        classify_pixel(self.height, pixel, threshold as f64)
    }

    /// Repaint `image` in place as a flood overlay.
    ///
    /// Rows are processed in parallel; every pixel depends only on its own
    /// channels.
    pub fn apply(&self, image: &mut RgbaImage, threshold: i32) {
        self.apply_cancellable(image, threshold, || false);
    }

    /// Like [`apply`](Self::apply), but polls `is_cancelled` before each row.
    ///
    /// Returns `false` if the pass stopped early. The image is then only
    /// partially repainted and should be discarded.
    pub fn apply_cancellable<F>(
        &self,
        image: &mut RgbaImage,
        threshold: i32,
        is_cancelled: F,
    ) -> bool
    where
        F: Fn() -> bool + Sync,
    {
        let row_len = image.width() as usize * 4;
        if row_len == 0 {
            return !is_cancelled();
        }

        let height = self.height;
        let threshold = threshold as f64;
        let pixels: &mut [u8] = &mut **image;

        pixels
            .par_chunks_mut(row_len)
            .try_for_each(|row| {
                if is_cancelled() {
                    return Err(());
                }
                for px in row.chunks_exact_mut(4) {
                    let out = classify_pixel(height, [px[0], px[1], px[2], px[3]], threshold);
                    px.copy_from_slice(&out);
                }
                Ok(())
            })
            .is_ok()
    }

    /// Decode `bytes`, classify every pixel and re-encode in the input format.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::Decode`] if `bytes` is not a supported image
    /// - [`ReliefError::Encode`] if the result cannot be encoded
    pub fn transform(&self, bytes: &[u8], threshold: i32) -> Result<Vec<u8>> {
        let (mut image, format) = decode(bytes)?;
        self.apply(&mut image, threshold);
        self.log_transformed(&image, threshold);
        encode(&image, format)
    }

    /// Like [`transform`](Self::transform), but gives up as soon as
    /// `is_cancelled` returns `true`.
    ///
    /// The flag is checked after decoding, before every row and before
    /// encoding. A cancelled call returns `Ok(None)` and produces no output.
    pub fn transform_cancellable<F>(
        &self,
        bytes: &[u8],
        threshold: i32,
        is_cancelled: F,
    ) -> Result<Option<Vec<u8>>>
    where
        F: Fn() -> bool + Sync,
    {
        let (mut image, format) = decode(bytes)?;
        if is_cancelled() || !self.apply_cancellable(&mut image, threshold, &is_cancelled) {
            tracing::debug!(encoding = %self.encoding, "Tile transform cancelled");
            return Ok(None);
        }
        self.log_transformed(&image, threshold);

        if is_cancelled() {
            return Ok(None);
        }
        encode(&image, format).map(Some)
    }

    /// Transform a tile file on disk and write the overlay to `output`.
    pub fn transform_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        threshold: i32,
    ) -> Result<()> {
        let bytes = std::fs::read(input)?;
        let overlay = self.transform(&bytes, threshold)?;
        std::fs::write(output, overlay)?;
        Ok(())
    }

    /// Compute elevation statistics for an encoded tile.
    pub fn summarize(&self, bytes: &[u8], threshold: i32) -> Result<TileSummary> {
        let (image, _) = decode(bytes)?;
        let threshold = threshold as f64;

        let mut summary = TileSummary {
            width: image.width(),
            height: image.height(),
            min_elevation: None,
            max_elevation: None,
            no_data_pixels: 0,
            flooded_pixels: 0,
        };

        for px in image.pixels() {
            let [r, g, b, a] = px.0;
            let elevation = (self.height)(r, g, b, a);

            if elevation <= threshold {
                summary.flooded_pixels += 1;
            }
            if elevation == NO_DATA && self.encoding == Encoding::Gsi {
                summary.no_data_pixels += 1;
                continue;
            }

            summary.min_elevation =
                Some(summary.min_elevation.map_or(elevation, |m| m.min(elevation)));
            summary.max_elevation =
                Some(summary.max_elevation.map_or(elevation, |m| m.max(elevation)));
        }

        Ok(summary)
    }

    fn log_transformed(&self, image: &RgbaImage, threshold: i32) {
        tracing::debug!(
            encoding = %self.encoding,
            threshold = threshold,
            width = image.width(),
            height = image.height(),
            "Tile transformed"
        );
    }
}

/// MIME type of an encoded tile, detected from its magic bytes.
///
/// Falls back to `application/octet-stream` for unknown data.
pub fn content_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[inline]
fn classify_pixel(height: HeightFn, [r, g, b, a]: [u8; 4], threshold: f64) -> [u8; 4] {
    if height(r, g, b, a) <= threshold {
        FLOODED
    } else {
        [r, g, b, 0]
    }
}

fn decode(bytes: &[u8]) -> Result<(RgbaImage, ImageFormat)> {
    let format = image::guess_format(bytes).map_err(ReliefError::Decode)?;
    let image = image::load_from_memory_with_format(bytes, format).map_err(ReliefError::Decode)?;
    Ok((image.into_rgba8(), format))
}

fn encode(image: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).map_err(ReliefError::Encode)?;
    Ok(out.into_inner())
}
