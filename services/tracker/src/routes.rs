//! Tracker service routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{AbandonRequest, CompleteRequest, PauseRequest, StartSessionRequest},
    state::AppState,
};

/// Create the router for the tracker service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/heartbeat", post(heartbeat_session))
        .route("/sessions/:id/pause", post(pause_session))
        .route("/sessions/:id/resume", post(resume_session))
        .route("/sessions/:id/complete", post(complete_session))
        .route("/sessions/:id/abandon", post(abandon_session))
        .route("/users/:user_id/active-session", get(get_active_session))
        .route("/goals/:goal_id/sessions", get(get_sessions_by_goal))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);

    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "tracker-service",
        "database": database,
    }))
}

/// Start a new activity session
pub async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state.engine.start(payload).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Get a session by ID
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .engine
        .get_session(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("session {} not found", id)))?;

    Ok(Json(session))
}

/// Record a liveness heartbeat for a live session
pub async fn heartbeat_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = state.engine.heartbeat(id).await?;

    Ok(Json(session))
}

/// Pause a live session
pub async fn pause_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<PauseRequest>>,
) -> ApiResult<impl IntoResponse> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let session = state.engine.pause(id, reason).await?;

    Ok(Json(session))
}

/// Resume a paused session
pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = state.engine.resume(id).await?;

    Ok(Json(session))
}

/// Complete a session
pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteRequest>,
) -> ApiResult<impl IntoResponse> {
    let session = state.engine.complete(id, payload.reason).await?;

    Ok(Json(session))
}

/// Abandon a session
pub async fn abandon_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<AbandonRequest>>,
) -> ApiResult<impl IntoResponse> {
    let interruption_reason = payload.and_then(|Json(body)| body.interruption_reason);
    let session = state.engine.abandon(id, interruption_reason).await?;

    Ok(Json(session))
}

/// Get the user's live-or-paused session, if any
pub async fn get_active_session(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = state.engine.get_active_session(user_id).await?;

    Ok(Json(session))
}

/// Get all sessions for a goal, newest first
pub async fn get_sessions_by_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let sessions = state.engine.get_sessions_by_goal(goal_id).await?;

    Ok(Json(sessions))
}
