//! Applicant profile: the "user information" every answer prompt is grounded on.

use serde::{Deserialize, Serialize};

pub mod loader;

pub use loader::load_profile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub current_city: String,
    pub ethnicity: String,
    pub gender: String,
    pub disability_status: String,
    pub veteran_status: String,
    pub security_clearance: bool,
    pub has_masters: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub degree: String,
    pub field_of_study: String,
    pub school_name: String,
    pub start_date: String,
    pub end_date: String,
    pub grade: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkExperience {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub title: String,
    pub description: String,
    pub skills_used: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    pub issue_date: String,
}

/// Everything known about the applicant. Every field is optional in the JSON
/// file; empty sections are left out of the rendered text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub personal: PersonalDetails,
    pub headline: String,
    pub years_of_experience: Option<u32>,
    pub skills: Vec<String>,
    pub education: Vec<Education>,
    pub work_experience: Vec<WorkExperience>,
    pub projects: Vec<Project>,
    pub certifications: Vec<Certification>,
    pub notes: String,
    /// Text pulled from the resume file, never read from the profile JSON.
    #[serde(skip)]
    pub resume_text: Option<String>,
}

impl UserProfile {
    pub fn is_empty(&self) -> bool {
        self.render().is_empty()
    }

    /// Renders the labelled, multi-section text handed to prompts.
    pub fn render(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        let personal = render_personal(&self.personal);
        if !personal.is_empty() {
            sections.push(format!("PERSONAL DETAILS\n{personal}"));
        }
        if !self.headline.trim().is_empty() {
            sections.push(format!("HEADLINE\n{}", self.headline.trim()));
        }
        if let Some(years) = self.years_of_experience {
            sections.push(format!("YEARS OF EXPERIENCE: {years}"));
        }
        if !self.skills.is_empty() {
            sections.push(format!("SKILLS: {}", self.skills.join(", ")));
        }

        let education: Vec<String> = self.education.iter().map(render_education).collect();
        push_list(&mut sections, "EDUCATION", education);

        let work: Vec<String> = self.work_experience.iter().map(render_work).collect();
        push_list(&mut sections, "WORK EXPERIENCE", work);

        let projects: Vec<String> = self
            .projects
            .iter()
            .map(|p| {
                let mut line = join_non_empty(&[p.title.as_str(), p.description.as_str()], ": ");
                if !p.skills_used.is_empty() {
                    line.push_str(&format!(" (Skills: {})", p.skills_used));
                }
                line
            })
            .collect();
        push_list(&mut sections, "PROJECTS", projects);

        let certifications: Vec<String> = self
            .certifications
            .iter()
            .map(|c| {
                let mut line = join_non_empty(&[c.name.as_str(), c.issuer.as_str()], ", ");
                if !c.issue_date.is_empty() {
                    line.push_str(&format!(" ({})", c.issue_date));
                }
                line
            })
            .collect();
        push_list(&mut sections, "CERTIFICATIONS", certifications);

        if !self.notes.trim().is_empty() {
            sections.push(format!("ADDITIONAL NOTES\n{}", self.notes.trim()));
        }
        if let Some(resume) = self.resume_text.as_deref().filter(|t| !t.is_empty()) {
            sections.push(format!("RESUME TEXT\n{resume}"));
        }

        sections.join("\n\n")
    }
}

fn render_personal(p: &PersonalDetails) -> String {
    let name = join_non_empty(&[p.first_name.as_str(), p.last_name.as_str()], " ");
    let fields = [
        ("Name", name.as_str()),
        ("Email", p.email.as_str()),
        ("Phone", p.phone.as_str()),
        ("Current city", p.current_city.as_str()),
        ("Ethnicity", p.ethnicity.as_str()),
        ("Gender", p.gender.as_str()),
        ("Disability status", p.disability_status.as_str()),
        ("Veteran status", p.veteran_status.as_str()),
    ];

    let mut lines: Vec<String> = fields
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{label}: {}", value.trim()))
        .collect();

    // Booleans only carry information next to other personal details.
    if !lines.is_empty() {
        lines.push(format!(
            "Active security clearance: {}",
            yes_no(p.security_clearance)
        ));
        lines.push(format!("Completed a master's degree: {}", yes_no(p.has_masters)));
    }
    lines.join("\n")
}

fn render_education(e: &Education) -> String {
    let degree = match (e.degree.is_empty(), e.field_of_study.is_empty()) {
        (false, false) => format!("{} in {}", e.degree, e.field_of_study),
        (false, true) => e.degree.clone(),
        (true, false) => e.field_of_study.clone(),
        (true, true) => String::new(),
    };
    let mut line = join_non_empty(&[degree.as_str(), e.school_name.as_str()], ", ");
    let dates = join_non_empty(&[e.start_date.as_str(), e.end_date.as_str()], " - ");
    if !dates.is_empty() {
        line.push_str(&format!(" ({dates})"));
    }
    if !e.grade.is_empty() {
        line.push_str(&format!(", grade {}", e.grade));
    }
    line
}

fn render_work(w: &WorkExperience) -> String {
    let role = match (w.title.is_empty(), w.company.is_empty()) {
        (false, false) => format!("{} at {}", w.title, w.company),
        (false, true) => w.title.clone(),
        (true, _) => w.company.clone(),
    };
    let mut line = join_non_empty(&[role.as_str(), w.location.as_str()], ", ");
    let end = if w.is_current { "Present" } else { w.end_date.as_str() };
    let dates = join_non_empty(&[w.start_date.as_str(), end], " - ");
    if !dates.is_empty() {
        line.push_str(&format!(" ({dates})"));
    }
    if !w.description.is_empty() {
        line.push_str(&format!(": {}", w.description));
    }
    line
}

fn push_list(sections: &mut Vec<String>, title: &str, items: Vec<String>) {
    let items: Vec<String> = items
        .into_iter()
        .filter(|i| !i.trim().is_empty())
        .map(|i| format!("- {i}"))
        .collect();
    if !items.is_empty() {
        sections.push(format!("{title}\n{}", items.join("\n")));
    }
}

fn join_non_empty(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> UserProfile {
        serde_json::from_str(
            r#"{
                "personal": {"first_name": "Ada", "last_name": "Lovelace", "current_city": "London"},
                "headline": "Backend engineer, 5+ years in Java and Spring Boot",
                "years_of_experience": 5,
                "skills": ["Java", "Spring Boot", "Kafka"],
                "education": [{"degree": "Master's Degree", "field_of_study": "Computer Science",
                               "school_name": "UCL", "start_date": "2015", "end_date": "2017"}],
                "work_experience": [{"title": "Senior Engineer", "company": "Acme",
                                     "start_date": "June 2022", "is_current": true,
                                     "description": "Built microservices"}],
                "certifications": [{"name": "AWS Developer", "issuer": "Amazon", "issue_date": "2023"}]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_profile_renders_nothing() {
        let profile = UserProfile::default();
        assert!(profile.is_empty());
        assert_eq!(profile.render(), "");
    }

    #[test]
    fn test_render_contains_sections() {
        let text = sample_profile().render();
        assert!(text.contains("Name: Ada Lovelace"));
        assert!(text.contains("Current city: London"));
        assert!(text.contains("YEARS OF EXPERIENCE: 5"));
        assert!(text.contains("SKILLS: Java, Spring Boot, Kafka"));
        assert!(text.contains("- Master's Degree in Computer Science, UCL (2015 - 2017)"));
        assert!(text.contains("- Senior Engineer at Acme (June 2022 - Present): Built microservices"));
        assert!(text.contains("- AWS Developer, Amazon (2023)"));
        assert!(!text.contains("PROJECTS"));
    }

    #[test]
    fn test_render_appends_resume_text_last() {
        let mut profile = sample_profile();
        profile.resume_text = Some("Ada Lovelace - Resume".to_string());
        let text = profile.render();
        assert!(text.ends_with("RESUME TEXT\nAda Lovelace - Resume"));
    }

    #[test]
    fn test_booleans_only_with_personal_details() {
        let profile = UserProfile {
            skills: vec!["Rust".to_string()],
            ..Default::default()
        };
        assert!(!profile.render().contains("security clearance"));

        let text = sample_profile().render();
        assert!(text.contains("Active security clearance: No"));
    }
}
