//! HTTP API for lesson generation.
//!
//! # Endpoints
//!
//! - `POST /api/lessons/generate` - Generate a lesson, streamed as server-sent events
//! - `POST /api/sections/validate` - Run a section validator over edited content
//! - `GET /api/events` - Server-sent feed of every event from every run
//! - `GET /api/lesson-types/:lesson_type/plan` - The effective plan for a lesson type
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lesson_generator::completion::{CliCompletion, CompletionProvider};
//! use lesson_generator::{create_router, AppState, Config};
//!
//! # async fn example() {
//! let config = Config::default();
//! let service = CliCompletion::new(CompletionProvider::Claude, config.completion_timeout());
//! let router = create_router(AppState::new(config, Arc::new(service)));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::completion::CompletionService;
use crate::config::Config;
use crate::error::LessonError;
use crate::events::{EventBroadcaster, LessonEvent};
use crate::generator::LessonGenerator;
use crate::lesson::{LessonPlan, LessonRequest};
use crate::level::CefrLevel;
use crate::progress::{ProgressCallback, ProgressUpdate};
use crate::validators::{ValidatableContent, ValidationResult};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /api/lessons/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Raw source text.
    pub source_text: String,
    /// Lesson type, e.g. `"discussion"`.
    pub lesson_type: String,
    /// CEFR level code; the configured default when absent.
    #[serde(default)]
    pub level: Option<String>,
    /// Lesson language; the configured default when absent.
    #[serde(default)]
    pub target_language: Option<String>,
}

/// Request body for `POST /api/sections/validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    /// Level the content targets.
    pub level: CefrLevel,
    /// Key vocabulary the content should recycle.
    #[serde(default)]
    pub key_vocabulary: Vec<String>,
    /// The content, tagged by `kind`.
    pub content: ValidatableContent,
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
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// Generator configured from `config`; cloned per run.
    pub generator: LessonGenerator,
    /// Fan-out for events of every run.
    pub broadcaster: EventBroadcaster,
}

impl AppState {
    /// Creates the state, configuring a generator from `config`.
    #[must_use]
    pub fn new(config: Config, service: Arc<dyn CompletionService>) -> Self {
        let generator = LessonGenerator::new(service)
            .with_weights(config.weights())
            .with_context_settings(config.context_settings());
        Self {
            config,
            generator,
            broadcaster: EventBroadcaster::default(),
        }
    }

    /// Turns a generate request into a lesson request, applying config defaults.
    fn lesson_request(&self, request: GenerateRequest) -> Result<LessonRequest, ApiError> {
        let level = match request.level.as_deref() {
            Some(code) => CefrLevel::from_str(code)?,
            None => self.config.default_level,
        };
        let lesson_request = LessonRequest::new(request.source_text, request.lesson_type)
            .with_level(level)
            .with_target_language(
                request
                    .target_language
                    .unwrap_or_else(|| self.config.target_language.clone()),
            );
        lesson_request.validate()?;
        Ok(lesson_request)
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The request cannot be acted on.
    BadRequest(String),
}

impl From<LessonError> for ApiError {
    fn from(error: LessonError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// Routes live under `/api`, with permissive CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/lessons/generate", post(handle_generate))
        .route("/sections/validate", post(handle_validate))
        .route("/events", get(handle_events))
        .route("/lesson-types/:lesson_type/plan", get(handle_plan));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

fn sse_event(event: &LessonEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.event_name()).json_data(event)
}

/// Handler for `POST /api/lessons/generate`.
///
/// Validates the request up front, then runs the lesson on a background
/// task and streams its events. Progress events arrive in pipeline order,
/// followed by one `complete` or `error` event.
async fn handle_generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let lesson_request = state.lesson_request(request)?;
    let plan = state.config.plan_for(&lesson_request.lesson_type);

    info!(
        lesson_type = %lesson_request.lesson_type,
        level = %lesson_request.level,
        sections = plan.sections.len(),
        "Received lesson generation request"
    );

    let (tx, rx) = mpsc::unbounded_channel::<LessonEvent>();
    let last_update: Arc<Mutex<Option<ProgressUpdate>>> = Arc::new(Mutex::new(None));

    let callback: ProgressCallback = {
        let tx = tx.clone();
        let last_update = Arc::clone(&last_update);
        let broadcaster = state.broadcaster.clone();
        Arc::new(move |update: &ProgressUpdate| {
            if let Ok(mut slot) = last_update.lock() {
                *slot = Some(update.clone());
            }
            let event = LessonEvent::progress(update.clone());
            broadcaster.send(event.clone());
            // The client may have disconnected; the run still finishes
            let _ = tx.send(event);
        })
    };

    let generator = state.generator.clone().with_progress_callback(callback);
    let broadcaster = state.broadcaster.clone();

    tokio::spawn(async move {
        let event = match generator.generate_lesson(&lesson_request, &plan).await {
            Ok(lesson) => LessonEvent::complete(lesson),
            Err(e) => {
                warn!(error = %e, "Lesson generation failed");
                let snapshot = last_update.lock().ok().and_then(|slot| slot.clone());
                LessonEvent::error(e.to_string(), snapshot)
            }
        };
        broadcaster.send(event.clone());
        let _ = tx.send(event);
    });

    let stream = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((sse_event(&event), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Handler for `POST /api/sections/validate`.
async fn handle_validate(Json(request): Json<ValidateRequest>) -> Json<ValidationResult> {
    let result = request
        .content
        .validate(request.level, &request.key_vocabulary);
    info!(
        is_valid = result.is_valid,
        issues = result.issues.len(),
        warnings = result.warnings.len(),
        "Validated section content"
    );
    Json(result)
}

/// Handler for `GET /api/events`.
async fn handle_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    info!("New event feed subscriber");
    let receiver = state.broadcaster.subscribe();

    let stream = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((sse_event(&event), receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event feed subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handler for `GET /api/lesson-types/:lesson_type/plan`.
async fn handle_plan(
    State(state): State<Arc<AppState>>,
    Path(lesson_type): Path<String>,
) -> Json<LessonPlan> {
    Json(state.config.plan_for(&lesson_type))
}
