// AI Answer Service
// Implements: question answering with option matching, answer memory, skills extraction.
// All LLM calls go through llm_client; no provider is called directly here.

pub mod handlers;
pub mod memory;
pub mod prompts;
pub mod question;
pub mod service;
pub mod skills;

pub use service::{AnswerService, AnswerSettings};
