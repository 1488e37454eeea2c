//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Retrieval-augmented reply to one message |
//! | `POST` | `/add_knowledge` | Embed and store a text snippet |
//! | `GET`  | `/health` | Status, version, and which collaborators are live |
//!
//! # Error Contract
//!
//! Every non-200 response carries `{ "detail": "..." }`:
//!
//! - `400`: malformed JSON or an empty `message` / `text`
//! - `500`: a required client is not initialised, or ingestion failed
//!
//! A failed completion is *not* an error: `/chat` answers 200 with the
//! fallback reply.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! talk to the service directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::build_service;
use crate::config::Config;
use crate::error::{ChatError, ChatResult};
use crate::models::{ChatRequest, ChatResponse, KnowledgeRequest, KnowledgeResponse};
use crate::service::ChatService;

/// Starts the HTTP server on `[server].bind` and runs until the process ends.
///
/// Collaborators are initialised first; see [`build_service`] for how
/// missing credentials degrade the service instead of stopping it.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = build_service(config).await;
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the application router around an already-constructed service.
pub fn router(service: ChatService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/add_knowledge", post(handle_add_knowledge))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> ChatResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ChatError::InvalidInput(rejection.body_text()))
}

// ============ POST /chat ============

async fn handle_chat(
    State(service): State<ChatService>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ChatResult<Json<ChatResponse>> {
    let request = parse_body(body)?;
    if request.message.is_empty() {
        return Err(ChatError::InvalidInput("message must not be empty".to_string()));
    }
    service.chat(&request).await.map(Json)
}

// ============ POST /add_knowledge ============

async fn handle_add_knowledge(
    State(service): State<ChatService>,
    body: Result<Json<KnowledgeRequest>, JsonRejection>,
) -> ChatResult<Json<KnowledgeResponse>> {
    let request = parse_body(body)?;
    if request.text.is_empty() {
        return Err(ChatError::InvalidInput("text must not be empty".to_string()));
    }
    service.add_knowledge(&request).await.map(Json)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    completion: bool,
    store: bool,
}

async fn handle_health(State(service): State<ChatService>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        completion: service.has_completion(),
        store: service.has_store(),
    })
}
