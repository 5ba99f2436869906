//! HTTP JSON API over the pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/status` | Store state (uninitialized or active collection) |
//! | `POST` | `/index` | Index a file or directory |
//! | `POST` | `/index-urls` | Fetch and index web pages |
//! | `POST` | `/query` | Plain answer |
//! | `POST` | `/query-with-citations` | Cited answer, references, retrieved chunks |
//! | `POST` | `/clear` | Delete the persisted collection |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_initialized", "message": "vector store not initialized: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_initialized` (409), `load_failure` (422),
//! `provider_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use ragline_core::models::GeneratedAnswer;
use ragline_core::store::MetadataFilter;
use ragline_core::Error;

use crate::config::Config;
use crate::pipeline::RagPipeline;
use crate::vector_store::StoreStatus;

type AppState = Arc<RagPipeline>;

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated. Fails if the pipeline cannot be
/// wired from `config` or the address cannot be bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(RagPipeline::from_config(config)?);
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("ragline API listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

/// Builds the router with every route and the CORS layer attached.
pub fn router(pipeline: Arc<RagPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/index", post(handle_index))
        .route("/index-urls", post(handle_index_urls))
        .route("/query", post(handle_query))
        .route("/query-with-citations", post(handle_query_with_citations))
        .route("/clear", post(handle_clear))
        .layer(cors)
        .with_state(pipeline)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
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

/// HTTP status for an [`Error::code`].
fn status_for(code: &str) -> StatusCode {
    match code {
        "bad_request" => StatusCode::BAD_REQUEST,
        "not_initialized" => StatusCode::CONFLICT,
        "load_failure" => StatusCode::UNPROCESSABLE_ENTITY,
        "provider_error" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let code = err.code();
        let status = status_for(code);
        if status.is_server_error() {
            tracing::error!(code, error = ?err, "request failed");
        }
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health, GET /status ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "ragline API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_status(State(pipeline): State<AppState>) -> Result<Json<StoreStatus>, AppError> {
    Ok(Json(pipeline.status().await?))
}

// ============ POST /index, POST /index-urls ============

#[derive(Deserialize)]
struct IndexRequest {
    source: String,
    #[serde(default)]
    recursive: bool,
}

#[derive(Deserialize)]
struct IndexUrlsRequest {
    urls: Vec<String>,
}

/// Number of chunks written, under the historical field name.
#[derive(Serialize)]
struct IndexResponse {
    num_documents: usize,
}

async fn handle_index(
    State(pipeline): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    if req.source.trim().is_empty() {
        return Err(bad_request("source must not be empty"));
    }
    let report = pipeline
        .index(&PathBuf::from(&req.source), req.recursive)
        .await?;
    Ok(Json(IndexResponse {
        num_documents: report.chunks,
    }))
}

async fn handle_index_urls(
    State(pipeline): State<AppState>,
    Json(req): Json<IndexUrlsRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    if req.urls.is_empty() {
        return Err(bad_request("urls must not be empty"));
    }
    let report = pipeline.index_from_urls(&req.urls).await?;
    Ok(Json(IndexResponse {
        num_documents: report.chunks,
    }))
}

// ============ POST /query, POST /query-with-citations ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    filter: Option<MetadataFilter>,
}

impl QueryRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.question.trim().is_empty() {
            return Err(bad_request("question must not be empty"));
        }
        Ok(())
    }

    /// An empty filter object means "no filter".
    fn filter(&self) -> Option<&MetadataFilter> {
        self.filter.as_ref().filter(|f| !f.is_empty())
    }
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
}

async fn handle_query(
    State(pipeline): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    req.validate()?;
    let answer = pipeline.query(&req.question, req.filter()).await?;
    Ok(Json(QueryResponse { answer }))
}

async fn handle_query_with_citations(
    State(pipeline): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<GeneratedAnswer>, AppError> {
    req.validate()?;
    let answer = pipeline
        .query_with_citations(&req.question, req.filter())
        .await?;
    Ok(Json(answer))
}

// ============ POST /clear ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_clear(State(pipeline): State<AppState>) -> Result<Json<MessageResponse>, AppError> {
    pipeline.clear().await?;
    Ok(Json(MessageResponse {
        message: "Index cleared successfully".to_string(),
    }))
}
