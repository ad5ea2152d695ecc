//! HTTP question-answering service.
//!
//! Exposes the retrieval-augmented answering pipeline via a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/run` | Answer a batch of questions, one answer string each |
//! | `POST` | `/query` | Answer one question, full structured result |
//!
//! # Error Contract
//!
//! Error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "questions must not be empty" } }
//! ```
//!
//! Per-question failures are NOT transported as HTTP errors: a batch of N
//! questions always yields N answers, with a failed question's slot carrying
//! its error text. Only request-level problems (bad payload, missing bearer
//! token) produce the envelope above.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::{answer_batch, answer_question, Answerer, HttpChatModel, QueryResult};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::retrieve::Retriever;
use crate::store::IndexStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    answerer: Arc<Answerer>,
    /// `None` until an index has been built; grounded questions then get a
    /// per-question "index not found" answer rather than a request error.
    retriever: Option<Arc<Retriever>>,
}

/// Starts the question-answering HTTP server.
///
/// The embedding model and index are loaded once, before binding; both are
/// read-only for the lifetime of the process. Re-ingesting requires a
/// restart (the index is rebuilt wholesale, never updated in place).
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let model = HttpChatModel::new(&config.model)?;
    let answerer = Arc::new(Answerer::new(Arc::new(model), config.model.max_attempts));

    let store_dir = &config.storage.index_dir;
    let retriever = if crate::store::index_present(store_dir) {
        let embedder = create_embedder(&config.embedding)?;
        let store = IndexStore::new(store_dir, embedder.clone());
        let retriever = Retriever::open(&store, embedder)?;
        println!(
            "index loaded: {} passages from {}",
            retriever.passage_count(),
            store_dir.display()
        );
        Some(Arc::new(retriever))
    } else {
        eprintln!(
            "Warning: no index in {} — document questions will be answered with an error until `dqa ingest` runs",
            store_dir.display()
        );
        None
    };

    let state = AppState {
        config,
        answerer,
        retriever,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/run", post(handle_run))
        .route("/query", post(handle_query))
        .layer(cors)
        .with_state(state);

    println!("answer service listening on http://{}", bind_addr);

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

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

/// Enforce the optional bearer token from `[server] api_key`.
fn check_auth(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.config.server.api_key.as_deref() else {
        return Ok(());
    };

    let supplied = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match supplied.strip_prefix("Bearer ") {
        Some(token) if token == expected => Ok(()),
        _ => Err(unauthorized("missing or invalid Authorization header")),
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

// ============ POST /run ============

#[derive(Deserialize)]
struct RunRequest {
    /// Presence of a non-empty reference selects grounded mode; its value is
    /// not used for scoping beyond that (one index per process).
    #[serde(default)]
    document: Option<String>,
    #[serde(default)]
    questions: Vec<String>,
}

#[derive(Serialize)]
struct RunResponse {
    answers: Vec<String>,
}

/// Batch endpoint: one answer string per question, in input order. Errors
/// for individual questions are carried in their slots, never as HTTP
/// failures.
async fn handle_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RunRequest>,
) -> Result<Json<RunResponse>, AppError> {
    check_auth(&state, &headers)?;

    if body.questions.is_empty() {
        return Err(bad_request("questions must not be empty"));
    }

    let grounded = body
        .document
        .as_deref()
        .map(|d| !d.trim().is_empty())
        .unwrap_or(false);

    let answers = answer_batch(
        &state.answerer,
        state.retriever.as_deref(),
        &body.questions,
        state.config.retrieval.top_k,
        grounded,
    )
    .await;

    Ok(Json(RunResponse { answers }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    document: Option<String>,
}

/// Single-question endpoint returning the full structured result.
async fn handle_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResult>, AppError> {
    check_auth(&state, &headers)?;

    if body.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let grounded = body
        .document
        .as_deref()
        .map(|d| !d.trim().is_empty())
        .unwrap_or(false);

    let result = answer_question(
        &state.answerer,
        state.retriever.as_deref(),
        &body.question,
        state.config.retrieval.top_k,
        grounded,
    )
    .await;

    Ok(Json(result))
}
