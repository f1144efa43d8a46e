use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Errors returned by the answer service and its handlers.
/// Rendered as `{"error": {"code", "message"}}` with a matching status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// The question could not be answered and the run is configured to pause
    /// for a human instead of guessing.
    #[error("Manual answer required: {0}")]
    NeedsManualAnswer(String),

    #[error("AI is disabled. Set USE_AI=true to enable it")]
    AiDisabled,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Catch-all for handlers; the answer flow itself maps every failure above.
    #[allow(dead_code)]
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::NeedsManualAnswer(msg) => {
                (StatusCode::CONFLICT, "MANUAL_ANSWER_REQUIRED", msg.clone())
            }
            AppError::AiDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI_DISABLED",
                self.to_string(),
            ),
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The AI provider failed to answer".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
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
