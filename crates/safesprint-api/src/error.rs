//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping domain errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use safesprint_core::error::SafeSprintError;
use safesprint_insight::InsightError;
use safesprint_interview::InterviewError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - malformed or empty input.
    BadRequest(String),
    /// 401 Unauthorized - missing or wrong credential.
    Unauthorized(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - request clashes with current state.
    Conflict(String, Option<serde_json::Value>),
    /// 422 Unprocessable Entity - valid syntax but rejected by validation.
    UnprocessableEntity(String, Option<serde_json::Value>),
    /// 502 Bad Gateway - the completion backend failed.
    BadGateway(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg, details) => (StatusCode::CONFLICT, "conflict", msg, details),
            ApiError::UnprocessableEntity(msg, details) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg, details)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg, None),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<SafeSprintError> for ApiError {
    fn from(err: SafeSprintError) -> Self {
        match &err {
            SafeSprintError::Config(msg) => ApiError::BadRequest(msg.clone()),
            SafeSprintError::Constraint(msg) => ApiError::Conflict(msg.clone(), None),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<InterviewError> for ApiError {
    fn from(err: InterviewError) -> Self {
        let message = err.to_string();
        match err {
            InterviewError::InvalidAccessCode => ApiError::Unauthorized(message),
            InterviewError::ParticipantNotFound(_) | InterviewError::SessionNotFound(_) => {
                ApiError::NotFound(message)
            }
            InterviewError::EmptyMessage | InterviewError::MessageTooLong { .. } => {
                ApiError::BadRequest(message)
            }
            InterviewError::NotEnoughTurns { remaining } => ApiError::UnprocessableEntity(
                message,
                Some(json!({ "remaining_turns": remaining })),
            ),
            InterviewError::TurnInProgress(_)
            | InterviewError::AlreadyCompleted
            | InterviewError::InvalidTransition(..) => ApiError::Conflict(message, None),
            InterviewError::Summarization(_) => ApiError::BadGateway(message),
            InterviewError::Storage(inner) => inner.into(),
        }
    }
}

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        let message = err.to_string();
        match err {
            InsightError::Validation { field, .. } => {
                ApiError::UnprocessableEntity(message, Some(json!({ "field": field })))
            }
            InsightError::SessionNotFound(_) => ApiError::NotFound(message),
            InsightError::Unauthorized => ApiError::Unauthorized(message),
            InsightError::NotEligible { completed, total } => ApiError::Conflict(
                message,
                Some(json!({ "completed": completed, "total": total })),
            ),
            InsightError::NoInput => ApiError::Conflict(message, None),
            InsightError::Synthesis(_) => ApiError::BadGateway(message),
            InsightError::AccessCodeExhausted => ApiError::Internal(message),
            InsightError::Storage(inner) => inner.into(),
        }
    }
}
