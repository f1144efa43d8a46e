use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::answers::question::QuestionType;
use crate::answers::service::AnswerOutcome;

/// Answers given during this run, reused for repeated questions.
pub struct AnswerBook {
    entries: RwLock<HashMap<(String, QuestionType), AnswerOutcome>>,
    overwrite: bool,
}

impl AnswerBook {
    pub fn new(overwrite_previous_answers: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            overwrite: overwrite_previous_answers,
        }
    }

    pub fn overwrites(&self) -> bool {
        self.overwrite
    }

    pub async fn lookup(&self, question: &str, question_type: QuestionType) -> Option<AnswerOutcome> {
        let key = (normalize_question(question), question_type);
        self.entries.read().await.get(&key).cloned()
    }

    /// Stores an answer. Returns `false` when an earlier answer was kept
    /// because overwriting is off.
    pub async fn record(&self, outcome: AnswerOutcome) -> bool {
        let key = (normalize_question(&outcome.question), outcome.question_type);
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) && !self.overwrite {
            return false;
        }
        entries.insert(key, outcome);
        true
    }

    /// All stored answers, sorted by question.
    pub async fn list(&self) -> Vec<AnswerOutcome> {
        let mut all: Vec<AnswerOutcome> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            a.question
                .to_lowercase()
                .cmp(&b.question.to_lowercase())
                .then(a.question_type.as_str().cmp(b.question_type.as_str()))
        });
        all
    }
}

/// Lowercases, collapses whitespace and drops trailing punctuation, so
/// "Years of Java?" and "years of  java" share an entry.
pub fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase()
}
