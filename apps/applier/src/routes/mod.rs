pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::answers::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/answers",
            post(handlers::handle_answer_question).get(handlers::handle_list_answers),
        )
        .route("/api/v1/skills", post(handlers::handle_extract_skills))
        .route("/api/v1/ai/status", get(handlers::handle_ai_status))
        .route("/api/v1/settings", get(handlers::handle_settings))
        .with_state(state)
}
