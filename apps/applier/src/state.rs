use std::sync::Arc;

use crate::answers::AnswerService;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Holds the backend chosen at startup and the answer memory for this run.
    pub answers: Arc<AnswerService>,
    pub config: Config,
}
