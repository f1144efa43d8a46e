//! Application questions: prompt construction and answer normalization.

use serde::{Deserialize, Serialize};

use crate::answers::prompts::{
    ANSWER_PROMPT_TEMPLATE, MULTIPLE_SELECT_INSTRUCTIONS, NO_USER_INFORMATION,
    SINGLE_SELECT_INSTRUCTIONS, TEXTAREA_INSTRUCTIONS, TEXT_INSTRUCTIONS,
};
use crate::llm_client::json::strip_json_fences;

/// Form control the question is rendered with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Text,
    Textarea,
    SingleSelect,
    MultipleSelect,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Textarea => "textarea",
            QuestionType::SingleSelect => "single_select",
            QuestionType::MultipleSelect => "multiple_select",
        }
    }

    pub fn is_select(&self) -> bool {
        matches!(self, QuestionType::SingleSelect | QuestionType::MultipleSelect)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub question_type: QuestionType,
    pub job_description: Option<String>,
    pub about_company: Option<String>,
    /// Overrides the loaded profile text for this one question.
    pub user_information: Option<String>,
}

/// Answer text plus the options it resolved to (select types only).
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAnswer {
    pub answer: String,
    pub selected: Vec<String>,
}

/// Options a human could actually pick. Drops blanks and "Select an option" style
/// placeholders that dropdowns carry as their first entry.
pub fn usable_options(options: &[String]) -> Vec<String> {
    options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !is_placeholder(o))
        .map(str::to_string)
        .collect()
}

fn is_placeholder(option: &str) -> bool {
    let text = option
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_lowercase();
    text.is_empty()
        || text == "select"
        || text == "please select"
        || text.starts_with("select an option")
        || text.starts_with("choose an option")
}

/// Builds the user prompt for a question. `options` must already be filtered
/// through `usable_options`.
pub fn build_answer_prompt(
    request: &QuestionRequest,
    options: &[String],
    user_information: &str,
) -> String {
    let type_instructions = match request.question_type {
        QuestionType::Text => TEXT_INSTRUCTIONS.to_string(),
        QuestionType::Textarea => TEXTAREA_INSTRUCTIONS.to_string(),
        QuestionType::SingleSelect => {
            format!("{}\n\n{}", options_block(options), SINGLE_SELECT_INSTRUCTIONS)
        }
        QuestionType::MultipleSelect => {
            format!("{}\n\n{}", options_block(options), MULTIPLE_SELECT_INSTRUCTIONS)
        }
    };

    let user_information = if user_information.trim().is_empty() {
        NO_USER_INFORMATION
    } else {
        user_information.trim()
    };

    let mut prompt = fill_template(
        ANSWER_PROMPT_TEMPLATE,
        &[
            ("user_information", user_information),
            ("question", request.question.trim()),
            ("question_type", request.question_type.as_str()),
            ("type_instructions", &type_instructions),
        ],
    );

    if let Some(jd) = non_blank(request.job_description.as_deref()) {
        prompt.push_str(&format!("\n\nJOB DESCRIPTION:\n{jd}"));
    }
    if let Some(company) = non_blank(request.about_company.as_deref()) {
        prompt.push_str(&format!("\n\nABOUT COMPANY:\n{company}"));
    }
    prompt
}

/// Single-pass `{name}` substitution. Inserted values are never rescanned, so a
/// question containing `{question}` stays literal.
pub(crate) fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn options_block(options: &[String]) -> String {
    let lines: Vec<String> = options.iter().map(|o| format!("- {o}")).collect();
    format!("OPTIONS:\n{}", lines.join("\n"))
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Turns a raw completion into a form-ready answer. Returns `None` when nothing
/// usable is left, including select answers that match no option.
pub fn normalize_answer(
    raw: &str,
    question_type: QuestionType,
    options: &[String],
) -> Option<NormalizedAnswer> {
    let cleaned = clean_answer(raw);
    if cleaned.is_empty() {
        return None;
    }

    match question_type {
        QuestionType::Text => Some(NormalizedAnswer {
            answer: cleaned.split_whitespace().collect::<Vec<_>>().join(" "),
            selected: vec![],
        }),
        QuestionType::Textarea => Some(NormalizedAnswer {
            answer: cleaned,
            selected: vec![],
        }),
        QuestionType::SingleSelect => match_option(&cleaned, options).map(|option| {
            NormalizedAnswer {
                answer: option.clone(),
                selected: vec![option],
            }
        }),
        QuestionType::MultipleSelect => {
            let selected = match_options(&cleaned, options);
            (!selected.is_empty()).then(|| NormalizedAnswer {
                answer: selected.join(", "),
                selected,
            })
        }
    }
}

/// Strips code fences, a leading `Answer:` label and wrapping quotes.
fn clean_answer(raw: &str) -> String {
    let mut text = strip_json_fences(raw).trim();
    for label in ["answer:", "your answer:", "final answer:"] {
        if text.len() >= label.len()
            && text.is_char_boundary(label.len())
            && text[..label.len()].eq_ignore_ascii_case(label)
        {
            text = text[label.len()..].trim();
            break;
        }
    }
    text.trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '`'))
        .trim()
        .to_string()
}

fn normalize_for_match(text: &str) -> String {
    strip_list_marker(text)
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == '!')
        .trim()
        .to_lowercase()
}

fn strip_list_marker(text: &str) -> &str {
    let text = text.trim();
    if let Some(rest) = text
        .strip_prefix("- ")
        .or_else(|| text.strip_prefix("* "))
        .or_else(|| text.strip_prefix("• "))
    {
        return rest;
    }
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = text[digits..]
            .strip_prefix(". ")
            .or_else(|| text[digits..].strip_prefix(") "))
        {
            return rest;
        }
    }
    text
}

/// True when `needle` occurs in `haystack` delimited by non-alphanumerics,
/// so "no" does not match inside "not".
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// Resolves an answer to one option: exact match, then the longest option the
/// answer mentions, then the first option containing the answer.
fn match_option(answer: &str, options: &[String]) -> Option<String> {
    let wanted = normalize_for_match(answer);
    if wanted.is_empty() {
        return None;
    }
    let normalized: Vec<String> = options.iter().map(|o| normalize_for_match(o)).collect();

    if let Some(i) = normalized.iter().position(|o| *o == wanted) {
        return Some(options[i].clone());
    }

    let mentioned = normalized
        .iter()
        .enumerate()
        .filter(|(_, o)| contains_phrase(&wanted, o))
        .max_by_key(|(_, o)| o.len())
        .map(|(i, _)| i);
    if let Some(i) = mentioned {
        return Some(options[i].clone());
    }

    normalized
        .iter()
        .position(|o| contains_phrase(o, &wanted))
        .map(|i| options[i].clone())
}

/// Resolves an answer to any number of options, kept in the options' order.
fn match_options(answer: &str, options: &[String]) -> Vec<String> {
    let whole = normalize_for_match(answer);
    let normalized: Vec<String> = options.iter().map(|o| normalize_for_match(o)).collect();
    let mut picked: Vec<bool> = normalized
        .iter()
        .map(|o| contains_phrase(&whole, o))
        .collect();

    // Pieces already covered by a picked option (e.g. "Yes" of "Yes, part time")
    // must not pull in a second one.
    for piece in answer.split(['\n', ',', ';']) {
        let piece = normalize_for_match(piece);
        if piece.is_empty() {
            continue;
        }
        let covered = normalized
            .iter()
            .zip(&picked)
            .any(|(o, p)| *p && contains_phrase(o, &piece));
        if covered {
            continue;
        }
        if let Some(option) = match_option(&piece, options) {
            if let Some(i) = options.iter().position(|o| *o == option) {
                picked[i] = true;
            }
        }
    }

    options
        .iter()
        .zip(picked)
        .filter(|(_, p)| *p)
        .map(|(o, _)| o.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn request(question_type: QuestionType) -> QuestionRequest {
        QuestionRequest {
            question: "Are you authorized to work in the US?".to_string(),
            options: vec![],
            question_type,
            job_description: None,
            about_company: None,
            user_information: None,
        }
    }

    #[test]
    fn test_question_type_serde() {
        let t: QuestionType = serde_json::from_str(r#""multiple_select""#).unwrap();
        assert_eq!(t, QuestionType::MultipleSelect);
        assert_eq!(QuestionType::default(), QuestionType::Text);
    }

    #[test]
    fn test_usable_options_drops_placeholders() {
        let options = opts(&["Select an option", " Yes ", "", "No", "-- Select --"]);
        assert_eq!(usable_options(&options), opts(&["Yes", "No"]));
    }

    #[test]
    fn test_prompt_for_text_question() {
        let prompt = build_answer_prompt(&request(QuestionType::Text), &[], "Name: Ada");
        assert!(prompt.starts_with("APPLICANT INFORMATION:\nName: Ada"));
        assert!(prompt.contains("QUESTION: Are you authorized to work in the US?"));
        assert!(prompt.contains("QUESTION TYPE: text"));
        assert!(prompt.contains("single-line text field"));
        assert!(!prompt.contains("OPTIONS:"));
    }

    #[test]
    fn test_prompt_for_select_lists_options_and_context() {
        let mut req = request(QuestionType::SingleSelect);
        req.job_description = Some("Build APIs in Rust".to_string());
        req.about_company = Some("  ".to_string());
        let prompt = build_answer_prompt(&req, &opts(&["Yes", "No"]), "");

        assert!(prompt.contains("(no applicant information provided)"));
        assert!(prompt.contains("OPTIONS:\n- Yes\n- No"));
        assert!(prompt.contains("exactly ONE option"));
        assert!(prompt.ends_with("JOB DESCRIPTION:\nBuild APIs in Rust"));
        assert!(!prompt.contains("ABOUT COMPANY"));
    }

    #[test]
    fn test_prompt_user_text_is_not_reinterpreted() {
        let mut req = request(QuestionType::Text);
        req.question = "What does {user_information} mean?".to_string();
        let prompt = build_answer_prompt(&req, &[], "Name: Ada");
        assert!(prompt.contains("QUESTION: What does {user_information} mean?"));
    }

    #[test]
    fn test_fill_template_leaves_unknown_braces() {
        let filled = fill_template("{a} and {b} and {", &[("a", "{b}")]);
        assert_eq!(filled, "{b} and {b} and {");
    }

    #[test]
    fn test_clean_answer_strips_label_and_quotes() {
        assert_eq!(clean_answer("Answer: \"5\""), "5");
        assert_eq!(clean_answer("```\nHello\n```"), "Hello");
        assert_eq!(clean_answer("  “Yes”  "), "Yes");
    }

    #[test]
    fn test_text_answer_is_single_line() {
        let normalized = normalize_answer("I have\n5 years\n", QuestionType::Text, &[]).unwrap();
        assert_eq!(normalized.answer, "I have 5 years");
        assert!(normalized.selected.is_empty());
    }

    #[test]
    fn test_textarea_keeps_paragraphs() {
        let normalized =
            normalize_answer("First para.\n\nSecond para.", QuestionType::Textarea, &[]).unwrap();
        assert_eq!(normalized.answer, "First para.\n\nSecond para.");
    }

    #[test]
    fn test_empty_completion_is_none() {
        assert!(normalize_answer("  \"\" ", QuestionType::Text, &[]).is_none());
    }

    #[test]
    fn test_single_select_exact_case_insensitive() {
        let options = opts(&["Yes", "No"]);
        let normalized = normalize_answer("yes.", QuestionType::SingleSelect, &options).unwrap();
        assert_eq!(normalized.answer, "Yes");
        assert_eq!(normalized.selected, opts(&["Yes"]));
    }

    #[test]
    fn test_single_select_prefers_longest_mentioned_option() {
        let options = opts(&["Yes", "Yes, with sponsorship", "No"]);
        let normalized = normalize_answer(
            "I would pick: Yes, with sponsorship",
            QuestionType::SingleSelect,
            &options,
        )
        .unwrap();
        assert_eq!(normalized.selected, opts(&["Yes, with sponsorship"]));
    }

    #[test]
    fn test_single_select_word_boundaries() {
        let options = opts(&["No", "Not sure"]);
        let normalized =
            normalize_answer("I am not sure", QuestionType::SingleSelect, &options).unwrap();
        assert_eq!(normalized.selected, opts(&["Not sure"]));
    }

    #[test]
    fn test_single_select_answer_inside_option() {
        let options = opts(&["Bachelor's Degree", "Master's Degree", "Doctorate"]);
        let normalized = normalize_answer("Master's", QuestionType::SingleSelect, &options).unwrap();
        assert_eq!(normalized.answer, "Master's Degree");
    }

    #[test]
    fn test_single_select_unmatched_is_none() {
        let options = opts(&["Yes", "No"]);
        assert!(normalize_answer("Maybe later", QuestionType::SingleSelect, &options).is_none());
    }

    #[test]
    fn test_multiple_select_keeps_option_order() {
        let options = opts(&["Java", "Python", "Rust", "Go"]);
        let normalized =
            normalize_answer("- Rust\n- Java", QuestionType::MultipleSelect, &options).unwrap();
        assert_eq!(normalized.selected, opts(&["Java", "Rust"]));
        assert_eq!(normalized.answer, "Java, Rust");
    }

    #[test]
    fn test_multiple_select_options_with_commas() {
        let options = opts(&["Yes, full time", "Yes, part time", "No"]);
        let normalized = normalize_answer(
            "Yes, part time",
            QuestionType::MultipleSelect,
            &options,
        )
        .unwrap();
        assert_eq!(normalized.selected, opts(&["Yes, part time"]));
    }

    #[test]
    fn test_multiple_select_pieces_inside_options() {
        let options = opts(&["Spring Boot", "Kubernetes", "Terraform"]);
        let normalized =
            normalize_answer("spring; kubernetes", QuestionType::MultipleSelect, &options).unwrap();
        assert_eq!(normalized.selected, opts(&["Spring Boot", "Kubernetes"]));
    }

    #[test]
    fn test_contains_phrase_boundaries() {
        assert!(contains_phrase("yes, i can", "yes"));
        assert!(!contains_phrase("nothing", "no"));
        assert!(!contains_phrase("anything", ""));
    }
}
