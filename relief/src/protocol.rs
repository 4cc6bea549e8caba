//! Custom-scheme tile loader.
//!
//! [`ReliefProtocol`] is the handler a map renderer registers for the relief
//! scheme. It receives a request URL plus a cancellation token, fetches the
//! encoded elevation tile from upstream, runs the [`ReliefTransform`] and
//! returns the overlay bytes. It is only available when the `fetch` feature
//! is enabled.
//!
//! # Outcomes
//!
//! | Situation                         | Result                    |
//! |-----------------------------------|---------------------------|
//! | Tile fetched and transformed      | `Ok(Some(bytes))`         |
//! | Upstream error or non-2xx status  | `Ok(None)` (no tile)      |
//! | Request cancelled                 | `Ok(None)`                |
//! | Upstream bytes are not an image   | `Err(ReliefError::Decode)`|
//! | Malformed scheme URL              | `Err(ReliefError::InvalidUrl)` |
//!
//! Cancellation also reaches the transform running on the blocking pool: it
//! stops between rows and its partial output is discarded.
//!
//! Nothing is retried here; the renderer owns its retry policy.
//!
//! ```ignore
//! use relief::ReliefProtocol;
//! use tokio_util::sync::CancellationToken;
//!
//! let protocol = ReliefProtocol::builder().encoding("mapbox").threshold(0).build()?;
//! let token = CancellationToken::new();
//! let tile = protocol
//!     .load("custom-relief://https://tiles.example.com/8/227/100.png?elevation=3", &token)
//!     .await?;
//! ```

use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::encoding::Encoding;
use crate::error::{ReliefError, Result};
use crate::tile_url::{scheme_url, ReliefUrl, DEFAULT_SCHEME};
use crate::transform::ReliefTransform;

/// Default timeout for upstream requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Encoding used when none is configured.
pub const DEFAULT_ENCODING: &str = "mapbox";

/// Builder for [`ReliefProtocol`].
///
/// # Example
///
/// ```ignore
/// use relief::ReliefProtocolBuilder;
///
/// let protocol = ReliefProtocolBuilder::new()
///     .scheme("custom-relief")
///     .encoding("gsi")
///     .threshold(5)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ReliefProtocolBuilder {
    scheme: String,
    encoding: String,
    threshold: i32,
    timeout_secs: u64,
}

impl Default for ReliefProtocolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReliefProtocolBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            threshold: 0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `RELIEF_SCHEME` | URL scheme handled by the protocol | `custom-relief` |
    /// | `RELIEF_ENCODING` | `gsi`, `gsj`, `mapbox` or `terrarium` | `mapbox` |
    /// | `RELIEF_THRESHOLD` | Default threshold in meters | 0 |
    /// | `RELIEF_TIMEOUT_SECS` | Upstream request timeout | 30 |
    ///
    /// Numeric values that fail to parse fall back to their defaults. The
    /// encoding is validated by [`build`](Self::build).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::new();
        Self {
            scheme: lookup("RELIEF_SCHEME").unwrap_or(defaults.scheme),
            encoding: lookup("RELIEF_ENCODING").unwrap_or(defaults.encoding),
            threshold: lookup("RELIEF_THRESHOLD")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.threshold),
            timeout_secs: lookup("RELIEF_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Set the URL scheme (without `://`).
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the encoding identifier.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Set the default threshold in meters.
    pub fn threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the upstream request timeout.
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Build the [`ReliefProtocol`].
    ///
    /// # Errors
    ///
    /// - [`ReliefError::UnsupportedEncoding`] if the encoding is unknown
    /// - [`ReliefError::Http`] if the HTTP client cannot be created
    pub fn build(self) -> Result<ReliefProtocol> {
        let transform = ReliefTransform::from_name(&self.encoding)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        tracing::debug!(
            scheme = %self.scheme,
            encoding = %transform.encoding(),
            threshold = self.threshold,
            "Relief protocol registered"
        );

        Ok(ReliefProtocol {
            scheme: self.scheme,
            transform,
            threshold: self.threshold,
            client,
        })
    }
}

/// Loader for relief scheme URLs.
///
/// Cloning is cheap: clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct ReliefProtocol {
    scheme: String,
    transform: ReliefTransform,
    threshold: i32,
    client: Client,
}

impl ReliefProtocol {
    /// Start building a protocol.
    pub fn builder() -> ReliefProtocolBuilder {
        ReliefProtocolBuilder::new()
    }

    /// Create a protocol on the default scheme.
    pub fn new(encoding: &str, threshold: i32) -> Result<Self> {
        Self::builder()
            .encoding(encoding)
            .threshold(threshold)
            .build()
    }

    /// The URL scheme handled by this protocol.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The elevation encoding of upstream tiles.
    pub fn encoding(&self) -> Encoding {
        self.transform.encoding()
    }

    /// The threshold used when a request URL carries none.
    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// The transform applied to fetched tiles.
    pub fn transform(&self) -> &ReliefTransform {
        &self.transform
    }

    /// Re-register with a new default threshold.
    pub fn with_threshold(&self, threshold: i32) -> Self {
        Self {
            threshold,
            ..self.clone()
        }
    }

    /// Build a request URL on this protocol's scheme.
    pub fn tile_url(&self, upstream: &str, elevation: Option<i32>) -> String {
        scheme_url(&self.scheme, upstream, elevation)
    }

    /// Handle a scheme URL request.
    ///
    /// The threshold comes from the URL's `elevation` parameter when present,
    /// otherwise from the protocol.
    pub async fn load(&self, url: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        let request = ReliefUrl::parse(url, &self.scheme)?;
        let threshold = request.elevation().unwrap_or(self.threshold);
        self.fetch_and_transform(request.upstream(), threshold, cancel)
            .await
    }

    /// Fetch an upstream tile and transform it with `threshold`.
    ///
    /// Returns `Ok(None)` when the tile cannot be fetched or the request is
    /// cancelled.
    pub async fn fetch_and_transform(
        &self,
        upstream: &str,
        threshold: i32,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(url = upstream, "Tile request cancelled during fetch");
                return Ok(None);
            }
            fetched = self.fetch(upstream) => match fetched {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(url = upstream, error = %e, "Tile fetch failed");
                    return Ok(None);
                }
            },
        };

        let task = self.spawn_transform(bytes, threshold, cancel);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(url = upstream, "Tile request cancelled during transform");
                Ok(None)
            }
            joined = task => match joined {
                Ok(result) => result,
                Err(e) => Err(ReliefError::Task(e.to_string())),
            },
        }
    }

    /// Run the transform on the blocking pool.
    ///
    /// The job polls `cancel` itself and stops without output once it fires,
    /// even after the awaiting request has given up on it.
    fn spawn_transform(
        &self,
        bytes: Vec<u8>,
        threshold: i32,
        cancel: &CancellationToken,
    ) -> JoinHandle<Result<Option<Vec<u8>>>> {
        let transform = self.transform;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            transform.transform_cancellable(&bytes, threshold, || cancel.is_cancelled())
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let failed = |reason: String| ReliefError::FetchFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 2×2 Mapbox tile with elevations -5, 10, 50, -20.
    fn mapbox_tile() -> Vec<u8> {
        let raw: Vec<u8> = [-5.0f64, 10.0, 50.0, -20.0]
            .iter()
            .flat_map(|e| {
                let v = ((e + 10000.0) * 10.0).round() as u32;
                [(v >> 16) as u8, (v >> 8) as u8, v as u8, 255]
            })
            .collect();
        let image = RgbaImage::from_raw(2, 2, raw).unwrap();
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    /// Serve one canned HTTP response per connection; returns the base URL.
    async fn serve(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let head = format!(
                        "HTTP/1.1 {}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    fn alpha_mask(png: &[u8]) -> Vec<u8> {
        image::load_from_memory(png)
            .unwrap()
            .into_rgba8()
            .pixels()
            .map(|p| p.0[3])
            .collect()
    }

    #[test]
    fn test_builder_rejects_unknown_encoding() {
        let err = ReliefProtocol::builder()
            .encoding("srtm")
            .build()
            .unwrap_err();
        assert!(matches!(err, ReliefError::UnsupportedEncoding { .. }));
    }

    #[test]
    fn test_builder_defaults() {
        let protocol = ReliefProtocol::builder().build().unwrap();
        assert_eq!(protocol.scheme(), "custom-relief");
        assert_eq!(protocol.encoding(), Encoding::Mapbox);
        assert_eq!(protocol.threshold(), 0);
    }

    #[test]
    fn test_builder_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("RELIEF_SCHEME", "flood"),
            ("RELIEF_ENCODING", "terrarium"),
            ("RELIEF_THRESHOLD", "-12"),
            ("RELIEF_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let builder = ReliefProtocolBuilder::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(builder.timeout_secs, DEFAULT_TIMEOUT_SECS);

        let protocol = builder.build().unwrap();
        assert_eq!(protocol.scheme(), "flood");
        assert_eq!(protocol.encoding(), Encoding::Terrarium);
        assert_eq!(protocol.threshold(), -12);
    }

    #[test]
    fn test_with_threshold() {
        let protocol = ReliefProtocol::new("gsi", 0).unwrap();
        let raised = protocol.with_threshold(25);
        assert_eq!(raised.threshold(), 25);
        assert_eq!(raised.encoding(), Encoding::Gsi);
        assert_eq!(protocol.threshold(), 0);
    }

    #[tokio::test]
    async fn test_load_transforms_tile() {
        let base = serve("200 OK", mapbox_tile()).await;
        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();

        let url = protocol.tile_url(&format!("{}/8/227/100.png", base), None);
        let tile = protocol.load(&url, &token).await.unwrap().unwrap();

        assert_eq!(alpha_mask(&tile), vec![255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn test_url_threshold_overrides_registered() {
        let base = serve("200 OK", mapbox_tile()).await;
        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();

        let url = protocol.tile_url(&format!("{}/8/227/100.png", base), Some(10));
        let tile = protocol.load(&url, &token).await.unwrap().unwrap();
        assert_eq!(alpha_mask(&tile), vec![255, 255, 0, 255]);

        let url = protocol.tile_url(&format!("{}/8/227/100.png", base), Some(-30));
        let tile = protocol.load(&url, &token).await.unwrap().unwrap();
        assert_eq!(alpha_mask(&tile), vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_non_success_status_yields_no_tile() {
        let base = serve("404 Not Found", Vec::new()).await;
        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();

        let url = protocol.tile_url(&format!("{}/8/227/100.png", base), None);
        assert_eq!(protocol.load(&url, &token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_network_error_yields_no_tile() {
        let protocol = ReliefProtocol::builder().timeout_secs(5).build().unwrap();
        let token = CancellationToken::new();

        let url = protocol.tile_url("http://127.0.0.1:1/8/227/100.png", None);
        assert_eq!(protocol.load(&url, &token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_upstream_image_is_an_error() {
        let base = serve("200 OK", b"<html>maintenance</html>".to_vec()).await;
        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();

        let url = protocol.tile_url(&format!("{}/8/227/100.png", base), None);
        let err = protocol.load(&url, &token).await.unwrap_err();
        assert!(matches!(err, ReliefError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cancelled_request_yields_nothing() {
        let base = serve("200 OK", mapbox_tile()).await;
        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let url = protocol.tile_url(&format!("{}/8/227/100.png", base), None);
        assert_eq!(protocol.load(&url, &token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_during_fetch() {
        // Accept the connection but never answer.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let url = protocol.tile_url(&format!("http://{}/8/227/100.png", addr), None);
        assert_eq!(protocol.load(&url, &token).await.unwrap(), None);
    }

    /// 1024×1024 Mapbox tile at sea level.
    fn large_tile() -> Vec<u8> {
        let image = RgbaImage::from_pixel(1024, 1024, Rgba([1, 134, 160, 255]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_transform_job_stops_when_cancelled() {
        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();

        let token = CancellationToken::new();
        let finished = protocol.spawn_transform(large_tile(), 0, &token).await.unwrap();
        assert!(finished.unwrap().is_some());

        // The job itself gives up, not only the request awaiting it
        token.cancel();
        let stopped = protocol.spawn_transform(large_tile(), 0, &token).await.unwrap();
        assert_eq!(stopped.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_after_body_arrives() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body_sent = CancellationToken::new();

        let body = large_tile();
        let sent = body_sent.clone();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
                sent.cancel();
            }
        });

        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            body_sent.cancelled().await;
            canceller.cancel();
        });

        let url = protocol.tile_url(&format!("http://{}/8/227/100.png", addr), None);
        assert_eq!(protocol.load(&url, &token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_an_error() {
        let protocol = ReliefProtocol::new("mapbox", 0).unwrap();
        let token = CancellationToken::new();

        let err = protocol
            .load("https://tiles.example.com/8/227/100.png", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidUrl { .. }));
    }
}
