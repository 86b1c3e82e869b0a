//! HTTP front end
//!
//! `POST /api/:operator` takes a multipart upload in the `file` field and the
//! operator parameters as query string pairs, runs the pipeline on tokio's
//! blocking pool and answers with the encoded image. `GET /api/operators`
//! lists the operator table and `GET /health` reports which models loaded.
//!
//! Only available with the "server" feature.

use crate::{
    error::{ErrorKind, FxError},
    models::ModelKind,
    operators::OperatorDescriptor,
    processor::FxProcessor,
    services::OutputFormatHandler,
    types::OutputFormat,
};
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// Query key selecting the output container; everything else is an operator parameter
pub const FORMAT_QUERY: &str = "format";

#[derive(Clone)]
struct AppState {
    processor: Arc<FxProcessor>,
}

/// Build the application router around a shared processor
pub fn router(processor: Arc<FxProcessor>) -> Router {
    let body_limit = processor.config().max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/api/operators", get(list_operators))
        .route("/api/:operator", post(apply_operator))
        .with_state(AppState { processor })
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until Ctrl-C
///
/// # Errors
/// - The bind address cannot be bound
/// - The server fails while running
pub async fn serve(processor: Arc<FxProcessor>) -> anyhow::Result<()> {
    let addr = processor.config().bind_address.clone();
    let loaded = processor.models().loaded_kinds();
    let app = router(processor);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, models = ?loaded, "🚀 lumafx listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    operators: usize,
    models: Vec<ModelKind>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        operators: state.processor.operators().operators().count(),
        models: state.processor.models().loaded_kinds(),
    })
}

async fn list_operators(State(state): State<AppState>) -> Json<Vec<OperatorDescriptor>> {
    Json(state.processor.operators().describe())
}

async fn apply_operator(
    State(state): State<AppState>,
    AxumPath(operator): AxumPath<String>,
    Query(mut query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let preferred = query
        .remove(FORMAT_QUERY)
        .map(|f| f.parse::<OutputFormat>())
        .transpose()?;
    let bytes = read_upload(&mut multipart).await?;
    run_operator(&state, operator, query, bytes, preferred).await
}

async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        if field.name() == Some(UPLOAD_FIELD) {
            let data = field.bytes().await.map_err(ApiError::from_multipart)?;
            return Ok(data.to_vec());
        }
    }
    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        ErrorKind::Client,
        format!("Missing multipart field '{UPLOAD_FIELD}'"),
    ))
}

async fn run_operator(
    state: &AppState,
    operator: String,
    params: HashMap<String, String>,
    bytes: Vec<u8>,
    preferred: Option<OutputFormat>,
) -> Result<Response, ApiError> {
    let processor = Arc::clone(&state.processor);
    let encoded = task::spawn_blocking(move || {
        let raw = params.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        processor.process_with_format(&bytes, &operator, raw, preferred)
    })
    .await
    .map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Server,
            format!("Transform task failed: {e}"),
        )
    })??;

    let content_type = OutputFormatHandler::content_type(encoded.format);
    Ok(([(header::CONTENT_TYPE, content_type)], encoded.bytes).into_response())
}

/// HTTP status for an error class
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Client => StatusCode::BAD_REQUEST,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response rendered as `{ "error": ..., "kind": ... }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: ErrorKind, message: String) -> Self {
        Self { status, kind, message }
    }

    fn from_multipart(err: axum::extract::multipart::MultipartError) -> Self {
        Self::new(err.status(), ErrorKind::Client, err.body_text())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FxError> for ApiError {
    fn from(err: FxError) -> Self {
        let kind = err.kind();
        Self::new(status_for(kind), kind, err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    kind: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, "{}", self.message);
        } else {
            warn!(status = %self.status, "{}", self.message);
        }
        let body = ErrorBody {
            error: &self.message,
            kind: self.kind.as_str(),
        };
        (self.status, Json(body)).into_response()
    }
}
