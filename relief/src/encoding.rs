//! Elevation encodings for RGB(A) terrain tiles.
//!
//! Terrain tile sets pack an elevation value into the color channels of each
//! pixel. This module resolves an encoding identifier into a plain function
//! pointer that decodes one pixel, so the per-pixel loop never dispatches on
//! a string.
//!
//! # Supported Encodings
//!
//! | Identifier        | Formula                                          |
//! |-------------------|--------------------------------------------------|
//! | `gsi`, `gsj`      | `x = r*65536 + g*256 + b`, 0.01 m units, two's complement at 2^24 |
//! | `mapbox`          | `(r*65536 + g*256 + b) / 10 - 10000`             |
//! | `terrarium`       | `r*256 + g + b/256 - 32768`                      |
//!
//! GSI tiles reserve `x == 2^23` (and fully transparent pixels) for missing
//! data, decoded as [`NO_DATA`].

use std::fmt;
use std::str::FromStr;

use crate::error::{ReliefError, Result};

/// Elevation returned by the GSI encoding for pixels without data.
pub const NO_DATA: f64 = -99999.0;

/// 2^23: GSI no-data code and sign boundary.
const GSI_NO_DATA_CODE: u32 = 1 << 23;

/// 2^24: GSI two's complement offset.
const GSI_OFFSET: i64 = 1 << 24;

/// GSI elevation resolution in meters.
const GSI_UNIT: f64 = 0.01;

/// Decodes one pixel `(r, g, b, a)` into an elevation in meters.
pub type HeightFn = fn(u8, u8, u8, u8) -> f64;

/// Channel-to-elevation formula family of a terrain tile set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Geospatial Information Authority of Japan (also GSJ) elevation tiles.
    Gsi,
    /// Mapbox Terrain-RGB.
    Mapbox,
    /// Mapzen / AWS Terrarium.
    Terrarium,
}

impl Encoding {
    /// All supported encodings.
    pub const ALL: [Encoding; 3] = [Encoding::Gsi, Encoding::Mapbox, Encoding::Terrarium];

    /// Canonical identifier of this encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Gsi => "gsi",
            Encoding::Mapbox => "mapbox",
            Encoding::Terrarium => "terrarium",
        }
    }

    /// Returns the decoding function for this encoding.
    pub fn height_fn(self) -> HeightFn {
        match self {
            Encoding::Gsi => gsi_height,
            Encoding::Mapbox => mapbox_height,
            Encoding::Terrarium => terrarium_height,
        }
    }

    /// Decode a single pixel.
    ///
    /// # Examples
    ///
    /// ```
    /// use relief::Encoding;
    ///
    /// assert_eq!(Encoding::Mapbox.height(0, 0, 0, 255), -10000.0);
    /// assert_eq!(Encoding::Terrarium.height(128, 0, 0, 255), 0.0);
    /// assert_eq!(Encoding::Gsi.height(0, 0, 100, 255), 1.0);
    /// ```
    pub fn height(self, r: u8, g: u8, b: u8, a: u8) -> f64 {
        (self.height_fn())(r, g, b, a)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gsi" | "gsj" => Ok(Encoding::Gsi),
            "mapbox" => Ok(Encoding::Mapbox),
            "terrarium" => Ok(Encoding::Terrarium),
            _ => Err(ReliefError::UnsupportedEncoding {
                name: s.to_string(),
            }),
        }
    }
}

/// Resolve an encoding identifier into its decoding function.
///
/// Unknown identifiers fail here rather than when the first pixel is decoded.
///
/// # Examples
///
/// ```
/// use relief::encoding::resolve;
///
/// let height = resolve("terrarium").unwrap();
/// assert_eq!(height(128, 0, 0, 255), 0.0);
///
/// assert!(resolve("srtm").is_err());
/// ```
pub fn resolve(name: &str) -> Result<HeightFn> {
    Ok(name.parse::<Encoding>()?.height_fn())
}

#[inline]
fn rgb24(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

fn gsi_height(r: u8, g: u8, b: u8, a: u8) -> f64 {
    let x = rgb24(r, g, b);
    if x < GSI_NO_DATA_CODE && a != 0 {
        x as f64 * GSI_UNIT
    } else if x == GSI_NO_DATA_CODE || a == 0 {
        NO_DATA
    } else {
        (x as i64 - GSI_OFFSET) as f64 * GSI_UNIT
    }
}

fn mapbox_height(r: u8, g: u8, b: u8, _a: u8) -> f64 {
    rgb24(r, g, b) as f64 / 10.0 - 10000.0
}

fn terrarium_height(r: u8, g: u8, b: u8, _a: u8) -> f64 {
    r as f64 * 256.0 + g as f64 + b as f64 / 256.0 - 32768.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Split a 24-bit value into (r, g, b).
    fn channels(x: u32) -> (u8, u8, u8) {
        ((x >> 16) as u8, (x >> 8) as u8, x as u8)
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!("gsi".parse::<Encoding>().unwrap(), Encoding::Gsi);
        assert_eq!("gsj".parse::<Encoding>().unwrap(), Encoding::Gsi);
        assert_eq!("mapbox".parse::<Encoding>().unwrap(), Encoding::Mapbox);
        assert_eq!("terrarium".parse::<Encoding>().unwrap(), Encoding::Terrarium);
        assert_eq!(" Mapbox ".parse::<Encoding>().unwrap(), Encoding::Mapbox);
    }

    #[test]
    fn test_unsupported_encoding() {
        let err = "srtm".parse::<Encoding>().unwrap_err();
        assert!(matches!(err, ReliefError::UnsupportedEncoding { ref name } if name == "srtm"));

        assert!(resolve("").is_err());
        assert!(resolve("terrain-rgb").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for encoding in Encoding::ALL {
            assert_eq!(encoding.to_string().parse::<Encoding>().unwrap(), encoding);
        }
    }

    #[test]
    fn test_gsi_boundaries() {
        let (r, g, b) = channels(GSI_NO_DATA_CODE);
        assert_eq!(gsi_height(r, g, b, 255), NO_DATA);

        let (r, g, b) = channels(GSI_NO_DATA_CODE - 1);
        assert_eq!(gsi_height(r, g, b, 255), (8388608.0 - 1.0) * 0.01);

        let (r, g, b) = channels(GSI_NO_DATA_CODE + 1);
        let below = gsi_height(r, g, b, 255);
        assert_eq!(below, (8388609.0 - 16777216.0) * 0.01);
        assert!(below < 0.0);
    }

    #[test]
    fn test_gsi_zero_alpha_is_no_data() {
        assert_eq!(gsi_height(0, 0, 100, 0), NO_DATA);
        assert_eq!(gsi_height(255, 255, 255, 0), NO_DATA);
    }

    #[test]
    fn test_gsi_values() {
        assert_eq!(gsi_height(0, 0, 0, 255), 0.0);
        assert_eq!(gsi_height(0, 0, 100, 255), 1.0);
        // 0xFFFFFF is -1 in two's complement
        assert_eq!(gsi_height(255, 255, 255, 255), -0.01);
    }

    #[test]
    fn test_mapbox_extremes() {
        assert_eq!(mapbox_height(0, 0, 0, 255), -10000.0);
        assert_eq!(mapbox_height(255, 255, 255, 255), 1667721.5);
        // 100000 / 10 - 10000 = 0
        let (r, g, b) = channels(100_000);
        assert_eq!(mapbox_height(r, g, b, 255), 0.0);
    }

    #[test]
    fn test_terrarium_values() {
        assert_eq!(terrarium_height(128, 0, 0, 255), 0.0);
        assert_eq!(terrarium_height(128, 1, 128, 255), 1.5);
        assert_eq!(terrarium_height(0, 0, 0, 255), -32768.0);
    }

    #[test]
    fn test_alpha_ignored_outside_gsi() {
        assert_eq!(mapbox_height(1, 2, 3, 0), mapbox_height(1, 2, 3, 255));
        assert_eq!(terrarium_height(1, 2, 3, 0), terrarium_height(1, 2, 3, 255));
    }

    #[test]
    fn test_total_and_deterministic() {
        for encoding in Encoding::ALL {
            let height = encoding.height_fn();
            for r in (0..=255u8).step_by(17) {
                for g in (0..=255u8).step_by(51) {
                    for b in [0u8, 1, 127, 128, 254, 255] {
                        for a in [0u8, 255] {
                            let first = height(r, g, b, a);
                            assert!(first.is_finite());
                            assert_eq!(first.to_bits(), height(r, g, b, a).to_bits());
                        }
                    }
                }
            }
        }
    }
}
