//! HTTP transport.
//!
//! A thin JSON layer over [`Oracle`]. Every handler delegates to one facade
//! call; the only logic here is request shaping, the single in-flight-build
//! guard, and mapping [`OracleError`] onto status codes.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, and chunk count |
//! | `GET`  | `/overview` | Index status and supported languages |
//! | `POST` | `/query` | Natural-language query |
//! | `POST` | `/symbol/usages` | Files likely referencing a symbol |
//! | `POST` | `/build` | Start a background (re)build |
//! | `GET`  | `/memory` | Recent project activity (`?k=N`) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "index_not_ready", "message": "index is empty; run build first" } }
//! ```
//!
//! Error codes: `bad_request` (400), `build_in_progress` (409),
//! `index_not_ready` (428), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::error::OracleError;
use crate::models::{MemoryEntry, Overview, QueryResponse, SymbolUsages};
use crate::oracle::Oracle;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    oracle: Arc<Oracle>,
    /// Set while a background build runs.
    building: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self {
            oracle,
            building: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/overview", get(handle_overview))
        .route("/query", post(handle_query))
        .route("/symbol/usages", post(handle_symbol_usages))
        .route("/build", post(handle_build))
        .route("/memory", get(handle_memory))
        .layer(cors)
        .with_state(state)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(oracle: Arc<Oracle>) -> anyhow::Result<()> {
    let bind_addr = oracle.config().server.bind.clone();
    let app = router(AppState::new(oracle));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "oracle server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<OracleError> for AppError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::EmptyIndex => AppError::new(
                StatusCode::PRECONDITION_REQUIRED,
                "index_not_ready",
                "Index is empty. Call /build first.",
            ),
            OracleError::InvalidInput(msg) => {
                AppError::new(StatusCode::BAD_REQUEST, "bad_request", msg)
            }
            other => {
                tracing::error!(error = %other, "request failed");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", other.to_string())
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    total_chunks: u64,
    building: bool,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let overview = state.oracle.overview().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        total_chunks: overview.total_chunks,
        building: state.building.load(Ordering::SeqCst),
    }))
}

// ============ GET /overview ============

async fn handle_overview(State(state): State<AppState>) -> Result<Json<Overview>, AppError> {
    Ok(Json(state.oracle.overview().await?))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(alias = "text")]
    natural_language_query: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    insight: Option<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let response = state
        .oracle
        .query(&req.natural_language_query, req.k, req.insight.as_deref())
        .await?;
    Ok(Json(response))
}

// ============ POST /symbol/usages ============

#[derive(Deserialize)]
struct SymbolRequest {
    symbol: String,
}

async fn handle_symbol_usages(
    State(state): State<AppState>,
    Json(req): Json<SymbolRequest>,
) -> Result<Json<SymbolUsages>, AppError> {
    if req.symbol.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "symbol must not be empty",
        ));
    }
    Ok(Json(state.oracle.symbol_usages(&req.symbol).await?))
}

// ============ POST /build ============

#[derive(Deserialize, Default)]
struct BuildRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct BuildStarted {
    status: String,
    force: bool,
}

/// Clears the in-flight flag when the build task ends, including by panic.
struct BuildGuard(Arc<AtomicBool>);

impl Drop for BuildGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Starts a build in the background and returns immediately.
async fn handle_build(
    State(state): State<AppState>,
    body: Option<Json<BuildRequest>>,
) -> Result<(StatusCode, Json<BuildStarted>), AppError> {
    let force = body.map(|Json(b)| b.force).unwrap_or_default();

    if state
        .building
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "build_in_progress",
            "a build is already running",
        ));
    }

    let oracle = state.oracle.clone();
    let guard = BuildGuard(state.building.clone());
    tokio::spawn(async move {
        let _guard = guard;
        match oracle.build(force).await {
            Ok(report) => tracing::info!(
                indexed = report.files_indexed,
                failed = report.files_failed,
                total_chunks = report.total_chunks,
                "background build finished"
            ),
            Err(e) => tracing::error!(error = %e, "background build failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(BuildStarted {
            status: "started".to_string(),
            force,
        }),
    ))
}

// ============ GET /memory ============

#[derive(Deserialize)]
struct MemoryParams {
    k: Option<usize>,
}

#[derive(Serialize)]
struct MemoryResponse {
    entries: Vec<MemoryEntry>,
}

async fn handle_memory(
    State(state): State<AppState>,
    Query(params): Query<MemoryParams>,
) -> Result<Json<MemoryResponse>, AppError> {
    let entries = state.oracle.memory_state(params.k).await?;
    Ok(Json(MemoryResponse { entries }))
}
