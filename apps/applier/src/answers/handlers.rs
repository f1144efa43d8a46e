//! Axum route handlers for the Answers API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::answers::question::QuestionRequest;
use crate::answers::service::{AnswerOutcome, ConnectionReport, SkillsOutcome};
use crate::config::{Provider, RunSettings};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExtractSkillsRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerListResponse {
    pub count: usize,
    pub answers: Vec<AnswerOutcome>,
}

#[derive(Debug, Serialize)]
pub struct AiSelection {
    pub use_ai: bool,
    pub provider: Provider,
    pub model: String,
    pub stream_output: bool,
    pub skills_json_repair: bool,
}

#[derive(Debug, Serialize)]
pub struct EffectiveSettings {
    pub pause_before_submit: bool,
    pub pause_at_failed_question: bool,
    pub ai_error_alerts: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub ai: AiSelection,
    pub run: RunSettings,
    pub effective: EffectiveSettings,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/answers
///
/// Answers one application question. 409 means the run is set to pause for a
/// manual answer instead of guessing.
pub async fn handle_answer_question(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<AnswerOutcome>, AppError> {
    let outcome = state.answers.answer_question(request).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/answers
pub async fn handle_list_answers(State(state): State<AppState>) -> Json<AnswerListResponse> {
    let answers = state.answers.answered_questions().await;
    Json(AnswerListResponse {
        count: answers.len(),
        answers,
    })
}

/// POST /api/v1/skills
pub async fn handle_extract_skills(
    State(state): State<AppState>,
    Json(request): Json<ExtractSkillsRequest>,
) -> Result<Json<SkillsOutcome>, AppError> {
    let outcome = state.answers.extract_skills(&request.job_description).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/ai/status
///
/// Round-trips a short prompt through the configured provider.
pub async fn handle_ai_status(
    State(state): State<AppState>,
) -> Result<Json<ConnectionReport>, AppError> {
    let report = state.answers.check_connection().await?;
    Ok(Json(report))
}

/// GET /api/v1/settings
pub async fn handle_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    let ai = &state.config.ai;
    let run = &state.config.run;
    Json(SettingsResponse {
        ai: AiSelection {
            use_ai: state.answers.ai_enabled(),
            provider: ai.provider,
            model: ai.active_model().to_string(),
            stream_output: ai.stream_output,
            skills_json_repair: ai.skills_json_repair,
        },
        run: run.clone(),
        effective: EffectiveSettings {
            pause_before_submit: run.effective_pause_before_submit(),
            pause_at_failed_question: run.effective_pause_at_failed_question(),
            ai_error_alerts: run.effective_ai_error_alerts(ai.show_ai_error_alerts),
        },
    })
}
