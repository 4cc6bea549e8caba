//! Error types for the relief library.

use thiserror::Error;

/// Errors that can occur while resolving encodings or transforming tiles.
#[derive(Error, Debug)]
pub enum ReliefError {
    /// The encoding identifier is not one of `gsi`, `gsj`, `mapbox`, `terrarium`.
    #[error("Unsupported encoding type: {name} (expected gsi, gsj, mapbox or terrarium)")]
    UnsupportedEncoding { name: String },

    /// Upstream tile could not be fetched (network error or non-success status).
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Tile bytes are not a valid image of a supported format.
    #[error("Failed to decode tile: {0}")]
    Decode(#[source] image::ImageError),

    /// The transformed tile could not be encoded.
    #[error("Failed to encode tile: {0}")]
    Encode(#[source] image::ImageError),

    /// Malformed scheme URL or tile template.
    #[error("Invalid tile URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// IO error when reading or writing tile files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error.
    #[cfg(feature = "fetch")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A blocking transform task panicked or was aborted.
    #[error("Transform task failed: {0}")]
    Task(String),
}

/// Result type alias using [`ReliefError`].
pub type Result<T> = std::result::Result<T, ReliefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReliefError::UnsupportedEncoding {
            name: "srtm".to_string(),
        };
        assert!(err.to_string().contains("srtm"));

        let err = ReliefError::FetchFailed {
            url: "https://example.com/1/2/3.png".to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        };
        assert!(err.to_string().contains("1/2/3.png"));
        assert!(err.to_string().contains("404"));

        let err = ReliefError::InvalidUrl {
            url: "ftp://tiles".to_string(),
            reason: "expected custom-relief:// scheme".to_string(),
        };
        assert!(err.to_string().contains("ftp://tiles"));
    }
}
