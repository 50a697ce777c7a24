use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{AskRequest, AskResponse, AskStatus, SessionCreated, SessionTranscript};
use crate::openai::OpenAIClient;
use crate::rag::{Answer, RagPipeline};
use crate::session::SessionStore;
use crate::status::{check_services, ServiceStatus};

pub struct AppState {
    pub pipeline: RagPipeline,
    pub sessions: Arc<SessionStore>,
    pub openai: Arc<OpenAIClient>,
    pub index_label: String,
    pub startup_status: ServiceStatus,
}

type ApiError = (StatusCode, String);

pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/ask", post(ask_handler))
        .route("/api/v1/sessions", post(create_session_handler))
        .route(
            "/api/v1/sessions/:id",
            get(get_session_handler).delete(end_session_handler),
        )
        .route("/api/v1/sessions/:id/messages", post(session_message_handler))
        .route("/api/health", get(health_check))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn pipeline_failure(e: PipelineError) -> ApiError {
    tracing::error!("Query failed: {}", e);
    let status = if e.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, e.to_string())
}

fn ask_response(answer: Answer) -> AskResponse {
    match answer {
        Answer::Answered { text, context } => AskResponse {
            status: AskStatus::Answered,
            answer: text,
            context: Some(context),
        },
        Answer::NoDocuments => AskResponse {
            status: AskStatus::NoDocuments,
            answer: Answer::NoDocuments.message().to_string(),
            context: None,
        },
    }
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let answer = state
        .pipeline
        .run(&request.question)
        .await
        .map_err(pipeline_failure)?;

    Ok(Json(ask_response(answer)))
}

async fn create_session_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionCreated>) {
    let id = state.sessions.create().await;
    (StatusCode::CREATED, Json(SessionCreated { id }))
}

async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<Uuid>,
) -> Result<Json<SessionTranscript>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or((StatusCode::NOT_FOUND, format!("Session {} not found", id)))?;

    let session = session.lock().await;
    Ok(Json(SessionTranscript {
        id,
        turns: session.turns().to_vec(),
        context: None,
    }))
}

async fn session_message_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<Uuid>,
    Json(request): Json<AskRequest>,
) -> Result<Json<SessionTranscript>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or((StatusCode::NOT_FOUND, format!("Session {} not found", id)))?;

    let mut session = session.lock().await;
    let answer = session
        .ask(&state.pipeline, &request.question)
        .await
        .map_err(pipeline_failure)?;

    Ok(Json(SessionTranscript {
        id,
        turns: session.turns().to_vec(),
        context: answer.context().map(str::to_string),
    }))
}

async fn end_session_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<Uuid>,
) -> StatusCode {
    if state.sessions.end(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let current = check_services(
        &state.openai,
        state.pipeline.index().as_ref(),
        &state.index_label,
    )
    .await;

    let healthy = current.openai.connected && current.vector_index.connected;
    Json(serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "services": current,
        "startup": state.startup_status,
        "active_sessions": state.sessions.len().await,
    }))
}
