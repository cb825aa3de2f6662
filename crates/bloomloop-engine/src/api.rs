//! HTTP API endpoints for the Bloomloop session server.
//!
//! This module provides the REST API used by the study frontend to run a
//! learning session: create it over pre-chunked content, pull chunks with
//! their questions, submit answers, and leave a final rating.
//!
//! # Endpoints
//!
//! - `POST /api/session` - Create a session over pre-chunked content
//! - `GET  /api/session/:id/chunk` - Serve the current chunk and question
//! - `POST /api/session/:id/answer` - Grade an answer and move the session
//! - `POST /api/session/:id/rating` - Record a satisfaction rating
//! - `GET  /api/session/:id/progress` - Read the progress snapshot
//!
//! # Example
//!
//! ```no_run
//! use bloomloop_engine::{AppState, Config, LlmOracle, create_router};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let config = Config::default();
//! let oracle = Arc::new(LlmOracle::from_config(&config.oracle).unwrap());
//! let state = AppState::new(config, oracle, None);
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::EngineError;
use crate::oracle::QuestionOracle;
use crate::persistence::LogSink;
use crate::registry::SessionRegistry;
use crate::session::{AnswerVerdict, Chunk, ChunkStep, Progress};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for session creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Pre-chunked study content, in reading order.
    pub chunks: Vec<Chunk>,
}

/// Response body for session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// Identifier for the new session.
    pub session_id: Uuid,
}

/// Request body for answer submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// The learner's answer: a choice letter for MCQ, free text for SAQ.
    pub answer: String,
    /// Seconds the learner spent on the question, when the client reports it.
    #[serde(default)]
    pub elapsed_time: Option<f64>,
}

/// Request body for the rating endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    /// Satisfaction rating, 1–5.
    pub rating: u8,
}

/// Response body for the rating endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    /// Whether the rating was recorded.
    pub acknowledged: bool,
}

/// Response body for the progress endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    /// Session position.
    pub progress: Progress,
    /// Whether every chunk has been answered.
    pub is_complete: bool,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Engine configuration.
    pub config: Config,
    /// Live session registry.
    pub registry: Arc<SessionRegistry>,
    /// Question generation and grading oracle.
    pub oracle: Arc<dyn QuestionOracle>,
    /// Optional persistence sink for completed session logs.
    pub sink: Option<Arc<dyn LogSink>>,
}

impl AppState {
    /// Creates a new `AppState` with an empty registry.
    #[must_use]
    pub fn new(
        config: Config,
        oracle: Arc<dyn QuestionOracle>,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            oracle,
            sink,
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Handler error carrying the HTTP status mapping.
#[derive(Debug)]
struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::SessionComplete { .. } => StatusCode::CONFLICT,
            EngineError::InvalidChoice { .. }
            | EngineError::NoPendingQuestion { .. }
            | EngineError::ConfigValidation { .. } => StatusCode::BAD_REQUEST,
            EngineError::GenerationExhausted { .. } | EngineError::OracleUnavailable { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// # Arguments
///
/// * `state` - The shared application state
///
/// # Returns
///
/// An axum `Router` configured with:
/// - All API routes under `/api`
/// - CORS middleware for development
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for development (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the API routes
    let api_routes = Router::new()
        .route("/session", post(handle_create_session))
        .route("/session/:id/chunk", get(handle_get_chunk))
        .route("/session/:id/answer", post(handle_submit_answer))
        .route("/session/:id/rating", post(handle_submit_rating))
        .route("/session/:id/progress", get(handle_get_progress));

    // Combine with state and middleware
    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/session`.
///
/// Creates a session over the provided chunks.
async fn handle_create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    if request.chunks.is_empty() {
        warn!("rejected session with no chunks");
        return Err(ApiError(EngineError::config_validation(
            "a session needs at least one chunk",
            "Provide a non-empty chunks array",
        )));
    }

    let chunk_count = request.chunks.len();
    let session_id = state.registry.create(request.chunks, &state.config).await;

    info!(%session_id, chunk_count, "session created");
    Ok(Json(CreateSessionResponse { session_id }))
}

/// Handler for `GET /api/session/:id/chunk`.
///
/// Serves the current chunk with a freshly generated question. On a retry
/// the chunk body is omitted.
async fn handle_get_chunk(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChunkStep>, ApiError> {
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;

    let step = session
        .next_chunk(state.oracle.as_ref(), &state.config)
        .await?;

    info!(
        session_id = %id,
        kind = %step.kind,
        level = %step.level,
        is_retry = step.is_retry,
        "chunk served"
    );
    Ok(Json(step))
}

/// Handler for `POST /api/session/:id/answer`.
///
/// Grades the answer to the pending question and moves the session.
async fn handle_submit_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerVerdict>, ApiError> {
    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;

    let verdict = session
        .submit_answer(
            &request.answer,
            request.elapsed_time,
            state.oracle.as_ref(),
            state.sink.as_deref(),
            &state.config,
        )
        .await?;

    info!(
        session_id = %id,
        is_correct = verdict.is_correct,
        is_last = verdict.is_last,
        "answer graded"
    );
    Ok(Json(verdict))
}

/// Handler for `POST /api/session/:id/rating`.
///
/// Records a final satisfaction rating. Last write wins.
async fn handle_submit_rating(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<RatingRequest>,
) -> Result<Json<RatingResponse>, ApiError> {
    if !(1..=5).contains(&request.rating) {
        return Err(ApiError(EngineError::config_validation(
            format!("rating must be between 1 and 5, got {}", request.rating),
            "Submit a rating from 1 to 5",
        )));
    }

    let session = state.registry.get(id).await?;
    let mut session = session.lock().await;
    session.submit_rating(request.rating);

    // A rating usually arrives after the last answer; re-upsert so the
    // persisted log carries it.
    if session.is_complete() && state.sink.is_some() {
        if let Err(e) = session.flush_logs(state.sink.as_deref()).await {
            warn!(session_id = %id, error = %e, "log re-flush failed");
        }
    }

    info!(session_id = %id, rating = request.rating, "rating recorded");
    Ok(Json(RatingResponse { acknowledged: true }))
}

/// Handler for `GET /api/session/:id/progress`.
///
/// Returns the session's position without mutating it.
async fn handle_get_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let session = state.registry.get(id).await?;
    let session = session.lock().await;

    Ok(Json(ProgressResponse {
        progress: session.progress(),
        is_complete: session.is_complete(),
    }))
}

// ============================================================================
// Tests
// ============================================================================
