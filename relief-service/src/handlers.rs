//! HTTP request handlers for the relief tile service.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use relief::{transform::content_type, ReliefError, ReliefTransform, TileCoord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Query parameters for the tile endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TileQuery {
    /// Threshold in meters. Pixels at or below it are painted blue.
    /// Defaults to the service threshold.
    pub elevation: Option<i32>,
}

/// Query parameters for the transform endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransformQuery {
    /// Encoding of the uploaded tile (`gsi`, `gsj`, `mapbox`, `terrarium`).
    /// Defaults to the service encoding.
    pub encoding: Option<String>,
    /// Threshold in meters. Defaults to the service threshold.
    pub elevation: Option<i32>,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Active service configuration.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    /// Scheme handled by the relief protocol.
    pub scheme: String,
    /// Encoding of upstream tiles.
    pub encoding: String,
    /// Default threshold in meters.
    pub threshold: i32,
    /// Upstream tile URL template.
    pub tile_url: String,
}

/// Get a flood overlay tile.
///
/// Fetches the upstream elevation tile at `z/x/y`, paints every pixel at or
/// below the threshold blue and everything else transparent.
///
/// # Returns
///
/// - `200 OK` with the overlay image
/// - `204 No Content` if the upstream tile is unavailable
/// - `400 Bad Request` if the coordinate is invalid
/// - `502 Bad Gateway` if upstream served something that is not an image
#[utoipa::path(
    get,
    path = "/tiles/{z}/{x}/{y}",
    tag = "tiles",
    params(
        ("z" = u32, Path, description = "Zoom level"),
        ("x" = u32, Path, description = "Tile column"),
        ("y" = String, Path, description = "Tile row, optionally with a .png suffix"),
        TileQuery
    ),
    responses(
        (status = 200, description = "Flood overlay tile (image/png)"),
        (status = 204, description = "No tile available upstream"),
        (status = 400, description = "Invalid tile coordinate", body = ErrorResponse),
        (status = 502, description = "Upstream tile is not a valid image", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, String)>,
    Query(query): Query<TileQuery>,
) -> Response {
    let coord = match parse_row(&y) {
        Some(y) => TileCoord::new(z, x, y),
        None => {
            return error_json(StatusCode::BAD_REQUEST, format!("Invalid tile row: {}", y));
        }
    };

    if !coord.is_valid() {
        return error_json(
            StatusCode::BAD_REQUEST,
            format!("Tile {} is outside the zoom {} grid", coord, coord.z),
        );
    }

    let upstream = state.tile_template.expand(coord);
    let threshold = query.elevation.unwrap_or(state.protocol.threshold());

    // Dropping the request future (client went away) cancels the tile task.
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    tracing::debug!(tile = %coord, threshold = threshold, "Tile request");

    match state
        .protocol
        .fetch_and_transform(&upstream, threshold, &token)
        .await
    {
        Ok(Some(bytes)) => {
            tracing::info!(tile = %coord, threshold = threshold, bytes = bytes.len(), "Tile served");
            tile_response(bytes)
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!(tile = %coord, error = %e, "Tile transform failed");
            let status = match e {
                ReliefError::Decode(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_json(status, e.to_string())
        }
    }
}

/// Transform an uploaded elevation tile.
///
/// The request body is the encoded tile; the response is the overlay in the
/// same image format.
#[utoipa::path(
    post,
    path = "/transform",
    tag = "tiles",
    params(TransformQuery),
    request_body(content = Vec<u8>, content_type = "image/png", description = "Encoded elevation tile"),
    responses(
        (status = 200, description = "Flood overlay tile"),
        (status = 400, description = "Unsupported encoding or undecodable tile", body = ErrorResponse)
    )
)]
pub async fn post_transform(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransformQuery>,
    body: Bytes,
) -> Response {
    let transform = match query.encoding.as_deref() {
        Some(name) => match ReliefTransform::from_name(name) {
            Ok(transform) => transform,
            Err(e) => return error_json(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => *state.protocol.transform(),
    };
    let threshold = query.elevation.unwrap_or(state.protocol.threshold());

    let result =
        tokio::task::spawn_blocking(move || transform.transform(&body, threshold)).await;

    match result {
        Ok(Ok(bytes)) => tile_response(bytes),
        Ok(Err(e)) => {
            tracing::warn!(encoding = %transform.encoding(), error = %e, "Upload transform failed");
            let status = match e {
                ReliefError::Decode(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_json(status, e.to_string())
        }
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Get the active configuration.
#[utoipa::path(
    get,
    path = "/config",
    tag = "system",
    responses((status = 200, description = "Active configuration", body = ConfigResponse))
)]
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        scheme: state.protocol.scheme().to_string(),
        encoding: state.protocol.encoding().to_string(),
        threshold: state.protocol.threshold(),
        tile_url: state.tile_template.as_str().to_string(),
    })
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Parse a tile row, accepting an image extension (`100.png`).
fn parse_row(y: &str) -> Option<u32> {
    let digits = match y.split_once('.') {
        Some((digits, _ext)) => digits,
        None => y,
    };
    digits.parse().ok()
}

fn tile_response(bytes: Vec<u8>) -> Response {
    let mime = content_type(&bytes);
    (StatusCode::OK, [(header::CONTENT_TYPE, mime)], bytes).into_response()
}

fn error_json(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}
