//! Tile URL utilities.
//!
//! Two kinds of URL flow through the pipeline:
//!
//! - **Scheme URLs** requested by the map renderer:
//!   `custom-relief://<upstream-url>[?elevation=<meters>]`. The prefix selects
//!   the relief handler; the optional `elevation` parameter carries the
//!   threshold for this request.
//! - **Upstream templates** addressing the encoded elevation tiles, with
//!   `{z}`, `{x}` and `{y}` placeholders.

use std::fmt;

use crate::error::{ReliefError, Result};

/// Scheme under which the relief handler is registered by default.
pub const DEFAULT_SCHEME: &str = "custom-relief";

/// GSI DEM tiles re-encoded as Mapbox Terrain-RGB.
pub const DEFAULT_TILE_TEMPLATE: &str =
    "https://xs489works.xsrv.jp/raster-tiles/gsi/gsi-dem-terrain-rgb/{z}/{x}/{y}.png";

/// Query parameter carrying the threshold in meters.
const ELEVATION_PARAM: &str = "elevation";

/// A parsed scheme URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReliefUrl {
    upstream: String,
    elevation: Option<i32>,
}

impl ReliefUrl {
    /// Parse a `<scheme>://<upstream>[?elevation=<meters>]` URL.
    ///
    /// The `elevation` pair is removed from the upstream URL; any other query
    /// parameters are kept in their original order.
    ///
    /// `elevation` is reserved for the threshold. An upstream that takes its
    /// own `elevation` parameter cannot be addressed through the scheme, and a
    /// non-integer value is rejected with [`ReliefError::InvalidUrl`].
    ///
    /// # Examples
    ///
    /// ```
    /// use relief::tile_url::ReliefUrl;
    ///
    /// let url = ReliefUrl::parse(
    ///     "custom-relief://https://tiles.example.com/8/227/100.png?elevation=12",
    ///     "custom-relief",
    /// )
    /// .unwrap();
    /// assert_eq!(url.upstream(), "https://tiles.example.com/8/227/100.png");
    /// assert_eq!(url.elevation(), Some(12));
    /// ```
    pub fn parse(url: &str, scheme: &str) -> Result<Self> {
        let invalid = |reason: String| ReliefError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let rest = url
            .strip_prefix(scheme)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| invalid(format!("expected {}:// scheme", scheme)))?;

        let (base, query) = match rest.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (rest, None),
        };

        if base.is_empty() {
            return Err(invalid("missing upstream URL".to_string()));
        }

        let mut elevation = None;
        let mut kept = Vec::new();
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            match pair.split_once('=') {
                Some((ELEVATION_PARAM, value)) => {
                    let meters = value.trim().parse::<i32>().map_err(|_| {
                        invalid(format!("elevation must be an integer, got '{}'", value))
                    })?;
                    elevation = Some(meters);
                }
                _ if pair.is_empty() => {}
                _ => kept.push(pair),
            }
        }

        let upstream = if kept.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base, kept.join("&"))
        };

        Ok(Self {
            upstream,
            elevation,
        })
    }

    /// The URL of the encoded source tile.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Threshold carried by the URL, if any.
    pub fn elevation(&self) -> Option<i32> {
        self.elevation
    }
}

/// Build a scheme URL for an upstream tile.
///
/// # Examples
///
/// ```
/// use relief::tile_url::scheme_url;
///
/// assert_eq!(
///     scheme_url("custom-relief", "https://t.example.com/1/2/3.png", Some(-4)),
///     "custom-relief://https://t.example.com/1/2/3.png?elevation=-4"
/// );
/// assert_eq!(
///     scheme_url("custom-relief", "https://t.example.com/1/2/3.png?key=abc", Some(10)),
///     "custom-relief://https://t.example.com/1/2/3.png?key=abc&elevation=10"
/// );
/// ```
pub fn scheme_url(scheme: &str, upstream: &str, elevation: Option<i32>) -> String {
    match elevation {
        Some(meters) => {
            let sep = if upstream.contains('?') { '&' } else { '?' };
            format!(
                "{}://{}{}{}={}",
                scheme, upstream, sep, ELEVATION_PARAM, meters
            )
        }
        None => format!("{}://{}", scheme, upstream),
    }
}

/// Address of a tile in a `{z}/{x}/{y}` pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level.
    pub z: u32,
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Check that `x` and `y` are inside the pyramid at zoom `z`.
    pub fn is_valid(&self) -> bool {
        if self.z >= 32 {
            return false;
        }
        let n = 1u64 << self.z;
        (self.x as u64) < n && (self.y as u64) < n
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// URL template for an upstream tile set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileTemplate {
    template: String,
}

impl TileTemplate {
    /// Create a template; it must contain `{z}`, `{x}` and `{y}`.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                return Err(ReliefError::InvalidUrl {
                    url: template.clone(),
                    reason: format!("template is missing {}", placeholder),
                });
            }
        }
        Ok(Self { template })
    }

    /// Substitute a tile coordinate into the template.
    ///
    /// # Examples
    ///
    /// ```
    /// use relief::tile_url::{TileCoord, TileTemplate};
    ///
    /// let template = TileTemplate::new("https://t.example.com/{z}/{x}/{y}.png").unwrap();
    /// assert_eq!(
    ///     template.expand(TileCoord::new(12, 3639, 1612)),
    ///     "https://t.example.com/12/3639/1612.png"
    /// );
    /// ```
    pub fn expand(&self, coord: TileCoord) -> String {
        self.template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }

    /// The raw template string.
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for TileTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TILE_TEMPLATE.to_string(),
        }
    }
}
