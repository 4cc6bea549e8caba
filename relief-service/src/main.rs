//! Relief Service - HTTP tile server for sea-level relief overlays.
//!
//! Serves upstream elevation tiles repainted as flood overlays: every pixel at
//! or below the requested elevation is opaque blue, the rest is transparent.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELIEF_TILE_URL` | Upstream tile template with `{z}`, `{x}`, `{y}` | GSI DEM Terrain-RGB |
//! | `RELIEF_ENCODING` | `gsi`, `gsj`, `mapbox` or `terrarium` | mapbox |
//! | `RELIEF_THRESHOLD` | Default threshold in meters | 0 |
//! | `RELIEF_SCHEME` | Scheme reported by `/config` | custom-relief |
//! | `RELIEF_TIMEOUT_SECS` | Upstream request timeout | 30 |
//! | `RELIEF_PORT` | HTTP server port | 8080 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /tiles/{z}/{x}/{y}.png?elevation=N` - Flood overlay tile
//! - `POST /transform?encoding=E&elevation=N` - Transform an uploaded tile
//! - `GET /config` - Active configuration
//! - `GET /health` - Health check
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use relief::{ReliefProtocolBuilder, TileTemplate, DEFAULT_TILE_TEMPLATE};
use relief_service::{handlers, router, AppState};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the relief service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relief Tile Service",
        version = "0.1.0",
        description = "Flood overlay tiles computed from elevation-encoded raster tiles.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "Pedro Sanz Martinez", url = "https://github.com/pedrosanzmtz/relief")
    ),
    paths(
        handlers::get_tile,
        handlers::post_transform,
        handlers::get_config,
        handlers::health_check,
    ),
    components(
        schemas(
            handlers::ErrorResponse,
            handlers::HealthResponse,
            handlers::ConfigResponse,
        )
    ),
    tags(
        (name = "tiles", description = "Flood overlay tile endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relief_service=info,relief=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("RELIEF_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let tile_template = TileTemplate::new(
        std::env::var("RELIEF_TILE_URL").unwrap_or_else(|_| DEFAULT_TILE_TEMPLATE.to_string()),
    )?;

    // An unsupported RELIEF_ENCODING stops the service here
    let protocol = ReliefProtocolBuilder::from_env().build()?;

    tracing::info!(
        tile_url = tile_template.as_str(),
        encoding = %protocol.encoding(),
        threshold = protocol.threshold(),
        port = port,
        "Starting relief service"
    );

    let state = Arc::new(AppState {
        protocol,
        tile_template,
    });

    // Build router
    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(router(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
