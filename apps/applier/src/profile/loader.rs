use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::UserProfile;

/// Resume text beyond this is dropped to keep prompts within model context.
const MAX_RESUME_CHARS: usize = 6000;

/// Loads the profile JSON (if configured) and attaches resume text.
/// A configured but unreadable profile is an error; a broken resume is not.
pub async fn load_profile(
    profile_path: Option<&Path>,
    resume_path: Option<&Path>,
) -> Result<UserProfile> {
    let mut profile = match profile_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read profile: {}", path.display()))?;
            let profile: UserProfile = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse profile JSON: {}", path.display()))?;
            info!("Loaded applicant profile from {}", path.display());
            profile
        }
        None => {
            warn!("PROFILE_PATH not set; answering without applicant details");
            UserProfile::default()
        }
    };

    if let Some(path) = resume_path {
        match read_resume_text(path).await {
            Ok(text) if !text.is_empty() => {
                info!(
                    "Loaded {} characters of resume text from {}",
                    text.chars().count(),
                    path.display()
                );
                profile.resume_text = Some(text);
            }
            Ok(_) => warn!("Resume {} contains no text; skipping", path.display()),
            Err(e) => warn!("Skipping resume {}: {e:#}", path.display()),
        }
    }

    Ok(profile)
}

/// PDFs go through `pdf-extract`; anything else is read as plain text.
async fn read_resume_text(path: &Path) -> Result<String> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    let raw = if is_pdf {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
            .await
            .context("Resume extraction task panicked")?
            .with_context(|| format!("Failed to extract text from {}", path.display()))?
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read resume: {}", path.display()))?
    };

    Ok(clean_resume_text(&raw))
}

/// Collapses whitespace runs and caps the length on a char boundary.
fn clean_resume_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_RESUME_CHARS)
        .collect()
}
