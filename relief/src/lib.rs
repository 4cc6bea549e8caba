//! # Relief - Sea-Level Relief Tiles
//!
//! Turns elevation-encoded raster tiles into flood overlays: every pixel at or
//! below a threshold elevation becomes opaque blue, every other pixel becomes
//! transparent. Rendered over a shaded-relief basemap, this shows which areas
//! lie below a given sea level.
//!
//! ## Features
//!
//! - **Three encodings**: GSI/GSJ, Mapbox Terrain-RGB and Terrarium
//! - **Resolved once**: encoding identifiers are validated when a transform is
//!   built, never per pixel
//! - **Lossless**: overlays are re-encoded in the source container format
//! - **Custom scheme loader** (feature `fetch`): handles
//!   `custom-relief://<tile-url>[?elevation=<m>]` requests with cancellation
//!
//! ## Quick Start
//!
//! ```ignore
//! use relief::{Encoding, ReliefTransform};
//!
//! let transform = ReliefTransform::new(Encoding::Mapbox);
//! let source = std::fs::read("12_3639_1612.png")?;
//!
//! // Everything at or below 5 m is painted blue
//! let overlay = transform.transform(&source, 5)?;
//! std::fs::write("12_3639_1612_relief.png", overlay)?;
//! ```
//!
//! ## Elevation Encodings
//!
//! | Encoding    | Elevation (m)                                   |
//! |-------------|-------------------------------------------------|
//! | GSI / GSJ   | `x * 0.01` with `x = r*65536 + g*256 + b`, signed at 2^23 |
//! | Mapbox      | `(r*65536 + g*256 + b) / 10 - 10000`            |
//! | Terrarium   | `r*256 + g + b/256 - 32768`                     |
//!
//! GSI marks missing data with `x == 2^23` (or zero alpha), decoded as
//! [`NO_DATA`] (-99999). No-data pixels are compared like any other value, so
//! they always show up as flooded.
//!
//! ## Testing
//!
//! The loader tests live behind the `fetch` feature and are skipped by a
//! plain `cargo test -p relief`. Run them with:
//!
//! ```text
//! cargo test -p relief --features fetch
//! ```

pub mod encoding;
pub mod error;
pub mod tile_url;
pub mod transform;

#[cfg(feature = "fetch")]
pub mod protocol;

// Re-export main types at crate root for convenience
pub use encoding::{Encoding, HeightFn, NO_DATA};
pub use error::{ReliefError, Result};
pub use tile_url::{ReliefUrl, TileCoord, TileTemplate, DEFAULT_SCHEME, DEFAULT_TILE_TEMPLATE};
pub use transform::{ReliefTransform, TileSummary, FLOODED};

#[cfg(feature = "fetch")]
pub use protocol::{ReliefProtocol, ReliefProtocolBuilder};
