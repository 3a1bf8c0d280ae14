//! Leader authentication.
//!
//! Leader endpoints carry the session's leader credential in the
//! `x-leader-key` header. The credential is compared as stored.

use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the leader credential.
pub const LEADER_KEY_HEADER: &str = "x-leader-key";

/// Middleware that validates the leader credential for `/sessions/{id}/...`.
///
/// Returns 401 if the header is missing or wrong, 404 if the session does
/// not exist.
pub async fn require_leader(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    req: Request,
    next: Next,
) -> Response {
    let key = match req.headers().get(LEADER_KEY_HEADER).map(|v| v.to_str()) {
        Some(Ok(key)) => key,
        Some(Err(_)) => {
            return ApiError::Unauthorized("Invalid leader key header encoding".into())
                .into_response();
        }
        None => {
            return ApiError::Unauthorized("Missing x-leader-key header".into()).into_response();
        }
    };

    match state.setup.verify_leader(session_id, key) {
        Ok(_) => next.run(req).await,
        Err(e) => ApiError::from(e).into_response(),
    }
}
