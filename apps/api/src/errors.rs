use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_gateway::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Interview not found: {0}")]
    InterviewNotFound(String),

    #[error("Candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown session")]
    SessionUnknown,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session already complete")]
    SessionComplete,

    #[error("LLM failure: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Llm(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::InterviewNotFound(id) => (
                StatusCode::NOT_FOUND,
                "interview_not_found",
                format!("No rubric set registered for interview {id}"),
            ),
            AppError::CandidateNotFound(id) => (
                StatusCode::NOT_FOUND,
                "candidate_not_found",
                format!("No candidate profile registered for {id}"),
            ),
            AppError::InvalidPayload(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_payload", msg.clone())
            }
            AppError::SessionUnknown => (
                StatusCode::UNAUTHORIZED,
                "session_unknown",
                "No live session with that id".to_string(),
            ),
            AppError::SessionExpired => (
                StatusCode::GONE,
                "session_expired",
                "The session idled out; start a new one".to_string(),
            ),
            AppError::SessionComplete => (
                StatusCode::CONFLICT,
                "session_complete",
                "The interview already finished; no further turns accepted".to_string(),
            ),
            AppError::Llm(msg) => {
                tracing::error!("LLM failure: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "llm_failure",
                    "The interviewer model is unavailable; retry the turn".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_session_errors_map_to_control_statuses() {
        assert_eq!(
            AppError::SessionUnknown.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::SessionExpired.into_response().status(),
            StatusCode::GONE
        );
        assert_eq!(
            AppError::SessionComplete.into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_llm_failure_is_bad_gateway() {
        let response = AppError::Llm("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_payload_is_bad_request() {
        let response = AppError::InvalidPayload("answer cannot be empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
