//! Skills extraction output: JSON normalization and the heuristic fallback
//! used when the model never produces parseable JSON.

use serde::Serialize;
use serde_json::Value;

use crate::llm_client::json::parse_lenient;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedSkills {
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    /// Years of experience required, as text ("5+ years").
    pub experience: Option<String>,
    pub education: Vec<String>,
    pub certifications: Vec<String>,
}

/// How the skills were recovered from the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    Json,
    Repaired,
    Heuristic,
}

impl ExtractedSkills {
    pub fn is_empty(&self) -> bool {
        self.technical_skills.is_empty()
            && self.soft_skills.is_empty()
            && self.experience.is_none()
            && self.education.is_empty()
            && self.certifications.is_empty()
    }

    /// Parses a completion leniently. `None` when no JSON object carrying at
    /// least one known key can be found.
    pub fn parse_json(text: &str) -> Option<Self> {
        let value: Value = parse_lenient(text).ok()?;
        Self::from_value(&value)
    }

    /// Accepts lists or comma-separated strings for list fields, and a number
    /// or a string for `experience`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        const KEYS: [&str; 5] = [
            "technical_skills",
            "soft_skills",
            "experience",
            "education",
            "certifications",
        ];
        if !KEYS.iter().any(|k| object.contains_key(*k)) {
            return None;
        }

        let list = |key: &str| object.get(key).map(string_list).unwrap_or_default();
        let experience = match object.get("experience") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(format!("{n} years")),
            _ => None,
        };

        Some(Self {
            technical_skills: list("technical_skills"),
            soft_skills: list("soft_skills"),
            experience,
            education: list("education"),
            certifications: list("certifications"),
        })
    }
}

fn string_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    dedupe(items)
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let key = item.to_lowercase();
        if item.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(item);
    }
    out
}

// ── Heuristic scraping ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Technical,
    Soft,
    Experience,
    Education,
    Certifications,
}

/// Maps a heading ("Technical Skills", `"soft_skills"`, "## Education") to a section.
fn classify_heading(heading: &str) -> Option<Section> {
    let h = heading
        .trim_matches(|c: char| matches!(c, '#' | '*' | '"' | '\'' | '_' | ' ' | ':'))
        .replace('_', " ")
        .to_lowercase();
    if h.is_empty() || h.len() > 40 {
        return None;
    }
    if h.contains("soft") {
        Some(Section::Soft)
    } else if h.contains("certif") {
        Some(Section::Certifications)
    } else if h.contains("education") || h.contains("degree") {
        Some(Section::Education)
    } else if h.contains("experience") {
        Some(Section::Experience)
    } else if h.contains("technical")
        || h.contains("skill")
        || h.contains("technolog")
        || h.contains("tools")
    {
        Some(Section::Technical)
    } else {
        None
    }
}

fn bullet_item(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest);
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        return rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "));
    }
    // Items of a truncated JSON array: `"Python",`
    if line.starts_with('"') && !line.contains("\":") {
        return Some(line);
    }
    None
}

fn clean_item(item: &str) -> String {
    item.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | ',' | '[' | ']' | '*' | '`'))
        .trim()
        .to_string()
}

/// Scrapes skills out of free text. Returns an empty value when nothing is found.
pub fn extract_heuristic(text: &str) -> ExtractedSkills {
    let mut skills = ExtractedSkills::default();
    let mut current: Option<Section> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || matches!(line, "{" | "}" | "]" | "],") {
            continue;
        }

        if let Some(item) = bullet_item(line) {
            if let Some(section) = current {
                push_items(&mut skills, section, &[clean_item(item)]);
                continue;
            }
        }

        if let Some((heading, rest)) = line.split_once(':') {
            if let Some(section) = classify_heading(heading) {
                let items: Vec<String> = rest
                    .split([',', ';'])
                    .map(clean_item)
                    .filter(|i| !i.is_empty())
                    .collect();
                if section == Section::Experience {
                    let joined = items.join(", ");
                    if !joined.is_empty() {
                        push_items(&mut skills, section, &[joined]);
                    }
                } else {
                    push_items(&mut skills, section, &items);
                }
                current = Some(section);
                continue;
            }
        }

        if let Some(section) = classify_heading(line) {
            current = Some(section);
        }
    }

    if skills.experience.is_none() {
        skills.experience = find_years(text);
    }

    skills.technical_skills = dedupe(std::mem::take(&mut skills.technical_skills));
    skills.soft_skills = dedupe(std::mem::take(&mut skills.soft_skills));
    skills.education = dedupe(std::mem::take(&mut skills.education));
    skills.certifications = dedupe(std::mem::take(&mut skills.certifications));
    skills
}

fn push_items(skills: &mut ExtractedSkills, section: Section, items: &[String]) {
    let items = items.iter().filter(|i| !i.is_empty()).cloned();
    match section {
        Section::Technical => skills.technical_skills.extend(items),
        Section::Soft => skills.soft_skills.extend(items),
        Section::Education => skills.education.extend(items),
        Section::Certifications => skills.certifications.extend(items),
        Section::Experience => {
            if skills.experience.is_none() {
                skills.experience = items.into_iter().next();
            }
        }
    }
}

/// Finds the first "N years" / "N+ years" phrase.
fn find_years(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let bytes = lower.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() || (i > 0 && bytes[i - 1].is_ascii_alphanumeric()) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let number = &lower[start..i];
        let plus = bytes.get(i) == Some(&b'+');
        let mut j = if plus { i + 1 } else { i };
        while bytes.get(j) == Some(&b' ') {
            j += 1;
        }
        if lower[j..].starts_with("year") && number.len() <= 2 {
            return Some(if plus {
                format!("{number}+ years")
            } else {
                format!("{number} years")
            });
        }
    }
    None
}
