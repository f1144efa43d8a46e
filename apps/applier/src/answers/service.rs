//! Answer service: answers application questions and extracts skills through
//! whichever `LlmBackend` was configured at startup.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::answers::memory::AnswerBook;
use crate::answers::prompts::{ANSWER_SYSTEM, SKILLS_PROMPT_TEMPLATE, SKILLS_SCHEMA, SKILLS_SYSTEM};
use crate::answers::question::{
    build_answer_prompt, fill_template, normalize_answer, usable_options, QuestionRequest,
    QuestionType,
};
use crate::answers::skills::{extract_heuristic, ExtractedSkills, ParseMethod};
use crate::config::Config;
use crate::errors::AppError;
use crate::llm_client::prompts::{
    CONNECTION_CHECK_PROMPT, JSON_ONLY_SYSTEM, JSON_REPAIR_PROMPT_TEMPLATE,
};
use crate::llm_client::{ChatMessage, CompletionOptions, LlmBackend, LlmError};

const ANSWER_TEMPERATURE: f64 = 0.1;
const SKILLS_TEMPERATURE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Ai,
    Memory,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub id: Uuid,
    pub question: String,
    pub question_type: QuestionType,
    pub answer: String,
    pub selected: Vec<String>,
    pub source: AnswerSource,
    pub provider: String,
    pub model: String,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillsOutcome {
    pub skills: ExtractedSkills,
    pub method: ParseMethod,
    pub provider: String,
    pub model: String,
    pub raw_response: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub provider: String,
    pub model: String,
    pub reply: String,
    pub latency_ms: u64,
}

/// Behaviour switches, resolved from configuration once at startup.
#[derive(Debug, Clone, Default)]
pub struct AnswerSettings {
    pub stream_output: bool,
    /// Log AI failures at error level with setup hints instead of warn.
    pub ai_error_alerts: bool,
    pub pause_at_failed_question: bool,
    pub skills_json_repair: bool,
    pub overwrite_previous_answers: bool,
}

impl AnswerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stream_output: config.ai.stream_output,
            ai_error_alerts: config
                .run
                .effective_ai_error_alerts(config.ai.show_ai_error_alerts),
            pause_at_failed_question: config.run.effective_pause_at_failed_question(),
            skills_json_repair: config.ai.skills_json_repair,
            overwrite_previous_answers: config.run.overwrite_previous_answers,
        }
    }
}

/// Why an answer attempt produced nothing usable.
enum Failure {
    Llm(LlmError),
    Unmatched(String),
}

pub struct AnswerService {
    /// `None` when AI is disabled.
    backend: Option<Arc<dyn LlmBackend>>,
    profile_text: String,
    settings: AnswerSettings,
    book: AnswerBook,
}

impl AnswerService {
    pub fn new(
        backend: Option<Arc<dyn LlmBackend>>,
        profile_text: String,
        settings: AnswerSettings,
    ) -> Self {
        let book = AnswerBook::new(settings.overwrite_previous_answers);
        Self {
            backend,
            profile_text,
            settings,
            book,
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&Arc<dyn LlmBackend>, AppError> {
        self.backend.as_ref().ok_or(AppError::AiDisabled)
    }

    pub async fn answered_questions(&self) -> Vec<AnswerOutcome> {
        self.book.list().await
    }

    pub async fn answer_question(&self, request: QuestionRequest) -> Result<AnswerOutcome, AppError> {
        let question = request.question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::Validation("question cannot be empty".to_string()));
        }
        let question_type = request.question_type;
        let options = usable_options(&request.options);
        if question_type.is_select() && options.is_empty() {
            return Err(AppError::Validation(format!(
                "{} question has no selectable options",
                question_type.as_str()
            )));
        }

        if !self.book.overwrites() {
            if let Some(mut previous) = self.book.lookup(&question, question_type).await {
                // A stored select answer only applies while its options are still offered.
                if previous.selected.iter().all(|s| options.contains(s)) {
                    debug!("Reusing stored answer for \"{question}\"");
                    previous.source = AnswerSource::Memory;
                    return Ok(previous);
                }
                debug!("Stored answer for \"{question}\" is not among the current options");
            }
        }

        let backend = self.backend()?;
        let user_information = request
            .user_information
            .as_deref()
            .filter(|info| !info.trim().is_empty())
            .unwrap_or(&self.profile_text);
        let prompt = build_answer_prompt(&request, &options, user_information);

        let messages = [ChatMessage::system(ANSWER_SYSTEM), ChatMessage::user(prompt)];
        let completion = CompletionOptions {
            temperature: Some(ANSWER_TEMPERATURE),
            stream: self.settings.stream_output,
            ..Default::default()
        };

        let failure = match backend.complete(&messages, &completion).await {
            Ok(raw) => match normalize_answer(&raw, question_type, &options) {
                Some(normalized) => {
                    let outcome = AnswerOutcome {
                        id: Uuid::new_v4(),
                        question,
                        question_type,
                        answer: normalized.answer,
                        selected: normalized.selected,
                        source: AnswerSource::Ai,
                        provider: backend.provider().to_string(),
                        model: backend.model().to_string(),
                        answered_at: Utc::now(),
                    };
                    info!(
                        "Answered {} question \"{}\"",
                        question_type.as_str(),
                        outcome.question
                    );
                    self.book.record(outcome.clone()).await;
                    return Ok(outcome);
                }
                None => Failure::Unmatched(raw),
            },
            Err(e) => Failure::Llm(e),
        };

        self.recover(question, question_type, &options, backend.as_ref(), failure)
    }

    /// Decides what a failed attempt turns into: a pause for a human, the first
    /// option of a select question, or the error itself.
    fn recover(
        &self,
        question: String,
        question_type: QuestionType,
        options: &[String],
        backend: &dyn LlmBackend,
        failure: Failure,
    ) -> Result<AnswerOutcome, AppError> {
        let reason = match &failure {
            Failure::Llm(e) => e.to_string(),
            Failure::Unmatched(raw) => {
                format!("reply \"{}\" matched no usable answer", raw.trim())
            }
        };
        self.report_failure(&format!("answer \"{question}\""), &reason);

        if self.settings.pause_at_failed_question {
            return Err(AppError::NeedsManualAnswer(format!(
                "could not answer \"{question}\": {reason}"
            )));
        }

        if let (true, Some(first)) = (question_type.is_select(), options.first()) {
            warn!("Falling back to first option \"{first}\" for \"{question}\"");
            return Ok(AnswerOutcome {
                id: Uuid::new_v4(),
                question,
                question_type,
                answer: first.clone(),
                selected: vec![first.clone()],
                source: AnswerSource::Fallback,
                provider: backend.provider().to_string(),
                model: backend.model().to_string(),
                answered_at: Utc::now(),
            });
        }

        match failure {
            Failure::Llm(e) => Err(AppError::Llm(e)),
            Failure::Unmatched(_) => Err(AppError::Llm(LlmError::EmptyContent)),
        }
    }

    /// Extracts skills from a job description: JSON, then one repair round
    /// trip, then heuristic scraping of the first reply.
    pub async fn extract_skills(&self, job_description: &str) -> Result<SkillsOutcome, AppError> {
        if job_description.trim().is_empty() {
            return Err(AppError::Validation(
                "job_description cannot be empty".to_string(),
            ));
        }
        let backend = self.backend()?;

        let prompt = fill_template(
            SKILLS_PROMPT_TEMPLATE,
            &[("schema", SKILLS_SCHEMA), ("job_description", job_description.trim())],
        );
        let messages = [ChatMessage::system(SKILLS_SYSTEM), ChatMessage::user(prompt)];
        let completion = CompletionOptions {
            temperature: Some(SKILLS_TEMPERATURE),
            json_output: true,
            stream: self.settings.stream_output,
            ..Default::default()
        };

        let raw = backend
            .complete(&messages, &completion)
            .await
            .inspect_err(|e| self.report_failure("extract skills", &e.to_string()))?;

        let outcome = |skills, method| SkillsOutcome {
            skills,
            method,
            provider: backend.provider().to_string(),
            model: backend.model().to_string(),
            raw_response: raw.clone(),
        };

        if let Some(skills) = ExtractedSkills::parse_json(&raw) {
            return Ok(outcome(skills, ParseMethod::Json));
        }
        warn!("Skills reply was not valid JSON");

        if self.settings.skills_json_repair {
            let repair = fill_template(
                JSON_REPAIR_PROMPT_TEMPLATE,
                &[("schema", SKILLS_SCHEMA), ("raw_output", raw.as_str())],
            );
            let messages = [ChatMessage::system(JSON_ONLY_SYSTEM), ChatMessage::user(repair)];
            match backend.complete(&messages, &completion).await {
                Ok(fixed) => {
                    if let Some(skills) = ExtractedSkills::parse_json(&fixed) {
                        info!("Skills JSON recovered by repair request");
                        return Ok(outcome(skills, ParseMethod::Repaired));
                    }
                    warn!("Repaired skills reply was still not valid JSON");
                }
                Err(e) => warn!("Skills JSON repair request failed: {e}"),
            }
        }

        let skills = extract_heuristic(&raw);
        if skills.is_empty() {
            self.report_failure("extract skills", "no skills found in the reply");
            return Err(AppError::UnprocessableEntity(
                "could not extract skills from the AI reply".to_string(),
            ));
        }
        info!("Skills extracted heuristically");
        Ok(outcome(skills, ParseMethod::Heuristic))
    }

    pub async fn check_connection(&self) -> Result<ConnectionReport, AppError> {
        let backend = self.backend()?;
        let messages = [ChatMessage::user(CONNECTION_CHECK_PROMPT)];
        let completion = CompletionOptions {
            stream: self.settings.stream_output,
            ..Default::default()
        };

        let started = Instant::now();
        let reply = backend
            .complete(&messages, &completion)
            .await
            .inspect_err(|e| self.report_failure("reach the provider", &e.to_string()))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        info!(
            "Connection check to {} ({}) succeeded in {latency_ms}ms",
            backend.provider(),
            backend.model()
        );
        Ok(ConnectionReport {
            provider: backend.provider().to_string(),
            model: backend.model().to_string(),
            reply: reply.trim().to_string(),
            latency_ms,
        })
    }

    fn report_failure(&self, action: &str, reason: &str) {
        if self.settings.ai_error_alerts {
            error!(
                "AI failed to {action}: {reason}. Check AI_PROVIDER, the API key and model \
                 settings, and that the provider is reachable"
            );
        } else {
            warn!("AI failed to {action}: {reason}");
        }
    }
}
