//! HTTP API serving question answering and ingestion over JSON.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/answer` | Answer a question from the knowledge base |
//! | `POST` | `/ingest` | Run an ingestion pass over the document directory |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The server is stateless between requests: all conversation memory, if
//! any, is the caller's concern.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). Backend failures
//! are logged server-side; clients receive the generic `internal` message
//! rather than upstream detail.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer;
use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::generate::{Generator, OpenAiGenerator};
use crate::ingest;
use crate::models::IngestReport;
use crate::registry::NamespaceRegistry;
use crate::store::{PineconeStore, VectorStore};

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    registry: Arc<NamespaceRegistry>,
}

/// Starts the HTTP server.
///
/// All backend clients are constructed up front so a missing API key
/// fails at startup, not on the first request. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        store: Arc::new(PineconeStore::new(&config.store)?),
        embedder: Arc::new(OpenAiEmbedder::new(&config.embedding)?),
        generator: Arc::new(OpenAiGenerator::new(&config.generation)?),
        registry: Arc::new(NamespaceRegistry::connect(&config.registry.path).await?),
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/answer", post(handle_answer))
        .route("/ingest", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("kbx server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
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
    /// Machine-readable error code (`"bad_request"`, `"internal"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// 500 response. The underlying error is logged, never surfaced; upstream
/// service detail in a client-facing body would leak backend internals.
fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "internal error".to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    question: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    response: String,
}

/// Handler for `POST /answer`.
///
/// Empty (or whitespace-only) questions are rejected with 400 before any
/// backend is contacted.
async fn handle_answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let response = answer::answer_question(
        &request.question,
        &state.config,
        &state.config.store.namespace,
        state.store.as_ref(),
        state.embedder.as_ref(),
        state.generator.as_ref(),
    )
    .await
    .map_err(internal)?;

    Ok(Json(AnswerResponse { response }))
}

// ============ POST /ingest ============

/// Handler for `POST /ingest`.
///
/// Runs a full ingestion pass over the configured document directory and
/// returns the run report. Per-document failures are contained and show
/// up in the report's counters rather than failing the request.
async fn handle_ingest(State(state): State<AppState>) -> Result<Json<IngestReport>, AppError> {
    let paths = ingest::discover_documents(
        &state.config.documents.dir,
        &state.config.documents.include_globs,
    )
    .map_err(internal)?;

    let report = ingest::ingest_documents(
        &paths,
        &state.config,
        state.store.as_ref(),
        state.embedder.as_ref(),
        &state.registry,
        &state.config.store.namespace,
    )
    .await
    .map_err(internal)?;

    Ok(Json(report))
}
