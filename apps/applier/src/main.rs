mod answers;
mod config;
mod errors;
mod llm_client;
mod profile;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::answers::{AnswerService, AnswerSettings};
use crate::config::{Config, Provider};
use crate::llm_client::build_backend;
use crate::profile::load_profile;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Applier v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Run mode: ci={}, background={}, safe_mode={}, stealth={}",
        config.run.running_in_ci,
        config.run.run_in_background,
        config.run.safe_mode,
        config.run.stealth_mode
    );

    let profile = load_profile(config.profile_path.as_deref(), config.resume_path.as_deref())
        .await
        .context("Failed to load applicant profile")?;
    if profile.is_empty() {
        warn!("Applicant profile is empty; answers will be generic");
    }

    // Select the LLM backend once; every answer goes through it
    let backend = if config.ai.use_ai {
        let url = match config.ai.provider {
            Provider::Gemini => &config.ai.gemini_api_url,
            _ => &config.ai.llm_api_url,
        };
        info!(
            "AI provider: {} (model: {}, url: {url})",
            config.ai.provider.as_str(),
            config.ai.active_model()
        );
        Some(build_backend(&config.ai).context("Failed to initialize the LLM backend")?)
    } else {
        warn!("USE_AI is false; question answering and skills extraction are disabled");
        None
    };

    let answers = AnswerService::new(
        backend,
        profile.render(),
        AnswerSettings::from_config(&config),
    );

    // Build app state
    let state = AppState {
        answers: Arc::new(answers),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
