//! JSON HTTP server exposing the retrieval engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Chunk and index a raw text |
//! | `POST` | `/ingest-csv` | Index the text column of a CSV file (raw body) |
//! | `POST` | `/ask` | Answer a question from the indexed passages |
//! | `GET`  | `/stats` | Current passage count |
//! | `POST` | `/clear` | Drop all indexed passages |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "malformed_input", "message": "no text found in column 'context'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `malformed_input` (400),
//! `provider_error` (502), `internal` (500). `/ask` never returns a
//! provider error — retrieval and generation failures degrade to
//! diagnostic answer strings, so a provider outage is invisible to the
//! HTTP status.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    body::Bytes,
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
use crate::embedding::{create_embedder, Embedder};
use crate::error::IngestError;
use crate::generation::{create_generator, Generator};
use crate::ingest;
use crate::retriever::Retriever;
use crate::store::VectorStore;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor. The vector store is constructed once here and only
/// ever reached through these handles — no hidden globals.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    retriever: Arc<Retriever>,
}

impl AppState {
    /// Build providers, the store, and the retriever from configuration,
    /// then load the configured context directory into the store.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let config = Arc::new(config.clone());
        let store = Arc::new(VectorStore::new(config.embedding.dims));
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        let generator: Arc<dyn Generator> = Arc::from(create_generator(&config.generation)?);
        let retriever = Arc::new(Retriever::new(
            store.clone(),
            embedder.clone(),
            &config.retrieval,
        ));

        if let Some(dir) = &config.ingest.context_dir {
            ingest::load_context_dir(
                &store,
                embedder.as_ref(),
                &config.chunking,
                &config.embedding,
                dir,
            )
            .await;
        }

        Ok(Self {
            config,
            store,
            embedder,
            generator,
            retriever,
        })
    }
}

/// Starts the HTTP server on the configured bind address and serves until
/// the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("RAG server listening on http://{}", bind_addr);

    serve(listener, state).await
}

/// Serve the API on an already-bound listener. Split out from
/// [`run_server`] so tests can bind to an ephemeral port.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/ingest-csv", post(handle_ingest_csv))
        .route("/ask", post(handle_ask))
        .route("/stats", get(handle_stats))
        .route("/clear", post(handle_clear))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

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

fn malformed_input(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "malformed_input".to_string(),
        message: message.into(),
    }
}

fn provider_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "provider_error".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::MalformedInput(msg) => malformed_input(msg),
            IngestError::Provider(e) => provider_error(e.to_string()),
            IngestError::Store(e) => internal(e.to_string()),
        }
    }
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    text: String,
}

#[derive(Serialize)]
struct IngestResponse {
    status: String,
    chunks_created: usize,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }

    let chunks_created = ingest::ingest_text(
        &state.store,
        state.embedder.as_ref(),
        &state.config.chunking,
        &state.config.embedding,
        &req.text,
        None,
    )
    .await?;

    Ok(Json(IngestResponse {
        status: "added".to_string(),
        chunks_created,
    }))
}

// ============ POST /ingest-csv ============

#[derive(Serialize)]
struct IngestCsvResponse {
    status: String,
    documents_processed: usize,
    chunks_created: usize,
}

/// Accepts the CSV file content as the raw request body.
async fn handle_ingest_csv(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestCsvResponse>, AppError> {
    let (texts, column) = ingest::extract_csv_column(&body)?;
    tracing::info!(column = %column, rows = texts.len(), "ingesting CSV upload");

    let report = ingest::ingest_rows(
        &state.store,
        state.embedder.as_ref(),
        &state.config.chunking,
        &state.config.embedding,
        &texts,
        Some(&column),
    )
    .await?;

    Ok(Json(IngestCsvResponse {
        status: "success".to_string(),
        documents_processed: report.documents_processed,
        chunks_created: report.chunks_created,
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let result = answer::ask(
        &state.retriever,
        state.generator.as_ref(),
        state.config.generation.max_new_tokens,
        state.config.generation.temperature,
        &req.question,
    )
    .await;

    Ok(Json(AskResponse {
        answer: result.answer,
        context: result.context,
        score: result.score,
    }))
}

// ============ GET /stats ============

#[derive(Serialize)]
struct StatsResponse {
    total_passages: usize,
}

async fn handle_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        total_passages: state.store.size(),
    })
}

// ============ POST /clear ============

#[derive(Serialize)]
struct ClearResponse {
    status: String,
}

async fn handle_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    state.store.clear();
    tracing::info!("vector store cleared");
    Json(ClearResponse {
        status: "cleared".to_string(),
    })
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
