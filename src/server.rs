use crate::config::Config;
use crate::error::RelayError;
use crate::relay::RelayService;
use crate::storage::StoreStats;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    pub config: Arc<Config>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub invoker: String,
    pub timeout_secs: u64,
    pub max_file_size_bytes: usize,
    pub face_extraction: bool,
    pub temp_files: StoreStats,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, RelayError> {
        let relay = RelayService::from_config(&config)?;
        Ok(Self {
            relay: Arc::new(relay),
            config: Arc::new(config),
        })
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/api/ocr/process", post(handle_process))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Handle OCR upload requests
async fn handle_process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, RelayError> {
    let mut upload: Option<(Bytes, String)> = None;

    let max = state.config.max_file_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to parse multipart", max))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, "Failed to read file data", max))?;
        upload = Some((data, filename));
    }

    let (data, filename) = upload.ok_or(RelayError::MissingFile)?;

    let result = state.relay.process_image(&data, &filename).await?;

    Ok(Json(serde_json::Value::Object(result.into_fields())))
}

/// The body limit surfaces as a multipart error; report it as 413
fn multipart_error(e: MultipartError, context: &str, max: usize) -> RelayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::ImageTooLarge { max }
    } else {
        RelayError::InvalidRequest(format!("{}: {}", context, e))
    }
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        invoker: state.relay.invoker().name().to_string(),
        timeout_secs: state.config.timeout.as_secs(),
        max_file_size_bytes: state.config.max_file_size,
        face_extraction: state.relay.face_extraction_enabled(),
        temp_files: state.relay.store_stats(),
    })
}
