//! Route handler implementations.
//!
//! Handlers are thin: they extract input, call one service on `AppState`,
//! and serialize the result. Errors convert into [`ApiError`].

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use safesprint_core::types::NewSession;
use safesprint_insight::setup::presets as role_presets;
use safesprint_insight::{CreatedSession, Dashboard, PresetInfo, ProgressReport};
use safesprint_interview::{FinalizeOutcome, Transcript, TurnOutcome};
use safesprint_storage::SessionRepository;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub context: String,
    pub leader_key: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub access_code: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub total_sessions: u64,
}

#[derive(Debug, Serialize)]
pub struct PresetsResponse {
    pub presets: Vec<PresetInfo>,
    pub context_template: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub participant_id: Uuid,
    pub session_id: Uuid,
    pub role_label: String,
    pub has_completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub session_id: Uuid,
    pub report: String,
}

// =============================================================================
// Public
// =============================================================================

/// GET /health - liveness, uptime and session count.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let total_sessions = SessionRepository::new(Arc::clone(&state.database))
        .count()
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_sessions,
    })
}

/// GET /presets - role presets and the example context.
pub async fn presets() -> Json<PresetsResponse> {
    let (presets, template) = role_presets();
    Json(PresetsResponse {
        presets,
        context_template: template.to_string(),
    })
}

/// POST /sessions - create a session and issue access codes.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreatedSession>), ApiError> {
    let created = state.setup.create_session(NewSession {
        name: req.name,
        context: req.context,
        leader_credential: req.leader_key,
        roles: req.roles,
    })?;
    Ok((StatusCode::CREATED, Json(created)))
}

// =============================================================================
// Participant
// =============================================================================

/// POST /login - exchange an access code for a participant id.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let participant = state.interviews.login(&req.access_code)?;
    Ok(Json(LoginResponse {
        participant_id: participant.id,
        session_id: participant.session_id,
        role_label: participant.role_label,
        has_completed: participant.has_completed,
    }))
}

/// GET /participants/{id}/interview - open the interview and return it.
pub async fn interview(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<Transcript>, ApiError> {
    Ok(Json(state.interviews.open(participant_id).await?))
}

/// POST /participants/{id}/messages - send one answer.
pub async fn send_message(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    Ok(Json(state.interviews.send_turn(participant_id, &req.text).await?))
}

/// POST /participants/{id}/finalize - summarize and complete.
pub async fn finalize(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<FinalizeOutcome>, ApiError> {
    Ok(Json(state.interviews.finalize(participant_id).await?))
}

// =============================================================================
// Leader
// =============================================================================

/// GET /sessions/{id}/dashboard - session header, participants, progress.
pub async fn dashboard(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.orchestrator.dashboard(session_id)?))
}

/// GET /sessions/{id}/progress - completion counters.
pub async fn progress(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ProgressReport>, ApiError> {
    Ok(Json(state.orchestrator.progress(session_id)?))
}

/// GET /sessions/{id}/progress/stream - SSE of progress updates.
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let stream = state.orchestrator.watch(session_id)?.map(|progress| {
        let data = serde_json::to_string(&progress).unwrap_or_default();
        Ok(Event::default().event("progress").data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// POST /sessions/{id}/report - generate the report, or return the stored one.
///
/// Generation requires every participant to have finished.
pub async fn create_report(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ReportResponse>, ApiError> {
    if state.reports.report(session_id)?.is_none() {
        state.orchestrator.ensure_eligible(session_id)?;
    }
    let report = state.reports.synthesize(session_id).await?;
    Ok(Json(ReportResponse { session_id, report }))
}

/// GET /sessions/{id}/report - the stored report.
pub async fn get_report(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ReportResponse>, ApiError> {
    match state.reports.report(session_id)? {
        Some(report) => Ok(Json(ReportResponse { session_id, report })),
        None => Err(ApiError::NotFound(format!(
            "No report generated yet for session {}",
            session_id
        ))),
    }
}
