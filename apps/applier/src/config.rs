use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Serialize;

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub ai: AiConfig,
    pub run: RunSettings,
    pub profile_path: Option<PathBuf>,
    pub resume_path: Option<PathBuf>,
}

/// Which LLM family answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    DeepSeek,
    Ollama,
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::DeepSeek => "deepseek",
            Provider::Ollama => "ollama",
            Provider::Gemini => "gemini",
        }
    }

    pub fn default_api_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Ollama => "http://localhost:11434",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::DeepSeek => "deepseek-chat",
            Provider::Ollama => "llama2:latest",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "deepseek" => Ok(Provider::DeepSeek),
            "ollama" => Ok(Provider::Ollama),
            "gemini" => Ok(Provider::Gemini),
            other => bail!(
                "Unknown AI_PROVIDER '{other}'. Use one of: openai, deepseek, ollama, gemini"
            ),
        }
    }
}

/// Flavour of an OpenAI-compatible endpoint. `OpenAiLike` servers (LM Studio,
/// llama.cpp, Jan) do not all accept `response_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LlmSpec {
    OpenAi,
    OpenAiLike,
}

impl FromStr for LlmSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmSpec::OpenAi),
            "openai-like" => Ok(LlmSpec::OpenAiLike),
            other => bail!("Unknown LLM_SPEC '{other}'. Use 'openai' or 'openai-like'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub use_ai: bool,
    pub provider: Provider,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_spec: LlmSpec,
    pub gemini_api_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub stream_output: bool,
    pub show_ai_error_alerts: bool,
    pub timeout_secs: u64,
    pub skills_json_repair: bool,
}

/// Run-mode flags shared with the browser driver. The `effective_*` accessors
/// apply the background-mode overrides.
#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    pub running_in_ci: bool,
    pub run_in_background: bool,
    pub safe_mode: bool,
    pub stealth_mode: bool,
    pub pause_before_submit: bool,
    pub pause_at_failed_question: bool,
    pub overwrite_previous_answers: bool,
}

impl RunSettings {
    pub fn effective_pause_before_submit(&self) -> bool {
        self.pause_before_submit && !self.run_in_background
    }

    pub fn effective_pause_at_failed_question(&self) -> bool {
        self.pause_at_failed_question && !self.run_in_background
    }

    pub fn effective_ai_error_alerts(&self, requested: bool) -> bool {
        requested && !self.run_in_background
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            ai: AiConfig::from_env()?,
            run: RunSettings::from_env()?,
            profile_path: optional_env("PROFILE_PATH").map(PathBuf::from),
            resume_path: optional_env("RESUME_PATH").map(PathBuf::from),
        })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self> {
        let provider: Provider = env_or("AI_PROVIDER", "gemini").parse()?;

        Ok(AiConfig {
            use_ai: env_flag("USE_AI", true)?,
            provider,
            llm_api_url: optional_env("LLM_API_URL")
                .unwrap_or_else(|| provider.default_api_url().to_string()),
            llm_api_key: env_or("LLM_API_KEY", ""),
            llm_model: optional_env("LLM_MODEL")
                .unwrap_or_else(|| provider.default_model().to_string()),
            llm_spec: env_or("LLM_SPEC", "openai-like").parse()?,
            gemini_api_url: env_or("GEMINI_API_URL", Provider::Gemini.default_api_url()),
            gemini_api_key: env_or("GEMINI_API_KEY", ""),
            gemini_model: env_or("GEMINI_MODEL", Provider::Gemini.default_model()),
            stream_output: env_flag("STREAM_OUTPUT", false)?,
            show_ai_error_alerts: env_flag("SHOW_AI_ERROR_ALERTS", false)?,
            timeout_secs: env_or("LLM_TIMEOUT_SECS", "120")
                .parse::<u64>()
                .context("LLM_TIMEOUT_SECS must be a number of seconds")?,
            skills_json_repair: env_flag("SKILLS_JSON_REPAIR", true)?,
        })
    }

    /// Model name actually sent to the selected provider.
    pub fn active_model(&self) -> &str {
        match self.provider {
            Provider::Gemini => &self.gemini_model,
            _ => &self.llm_model,
        }
    }
}

impl RunSettings {
    fn from_env() -> Result<Self> {
        let running_in_ci = env_is_true("GITHUB_ACTIONS") || env_is_true("CI");
        let headless_default = cfg!(target_os = "linux") || running_in_ci;

        Ok(RunSettings {
            running_in_ci,
            run_in_background: env_flag("RUN_IN_BACKGROUND", headless_default)?,
            safe_mode: env_flag("SAFE_MODE", headless_default)?,
            stealth_mode: env_flag("STEALTH_MODE", false)?,
            pause_before_submit: env_flag("PAUSE_BEFORE_SUBMIT", true)?,
            pause_at_failed_question: env_flag("PAUSE_AT_FAILED_QUESTION", true)?,
            overwrite_previous_answers: env_flag("OVERWRITE_PREVIOUS_ANSWERS", false)?,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn env_is_true(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_flag(key: &str, default: bool) -> Result<bool> {
    match optional_env(key) {
        Some(raw) => parse_flag(&raw)
            .with_context(|| format!("Environment variable '{key}' must be true or false")),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("'{other}' is not a boolean"),
    }
}
