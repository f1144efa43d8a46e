// All LLM prompt constants for the answers module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for application questions.
pub const ANSWER_SYSTEM: &str = "You are filling in a job application on behalf of the applicant. \
    Answer every question truthfully from the applicant's information, in the first person, \
    professionally and briefly. \
    Never invent employers, degrees, certifications, or numbers that are not in the information. \
    When the information does not cover the question, give the most reasonable answer for this \
    applicant without adding caveats. \
    Return ONLY the answer text: no labels, no quotes, no explanations.";

/// Question prompt template.
/// Replace: {user_information}, {question}, {question_type}, {type_instructions}
pub const ANSWER_PROMPT_TEMPLATE: &str = r#"APPLICANT INFORMATION:
{user_information}

QUESTION: {question}
QUESTION TYPE: {question_type}

{type_instructions}"#;

pub const TEXT_INSTRUCTIONS: &str = "This is a single-line text field. \
    Reply with a short answer on one line. \
    If the question asks for a number (years, salary, notice period), reply with the number only.";

pub const TEXTAREA_INSTRUCTIONS: &str = "This is a multi-line text area. \
    Reply with a more detailed answer of 2-3 short paragraphs.";

pub const SINGLE_SELECT_INSTRUCTIONS: &str =
    "Please select exactly ONE option from the list above. \
    Reply with the option text exactly as written and nothing else.";

pub const MULTIPLE_SELECT_INSTRUCTIONS: &str =
    "You may select MULTIPLE options from the list above if appropriate. \
    Reply with each chosen option exactly as written, one per line, and nothing else.";

/// Used when neither the request nor the loaded profile carries any information.
pub const NO_USER_INFORMATION: &str = "(no applicant information provided)";

/// System prompt for skills extraction; enforces JSON-only output.
pub const SKILLS_SYSTEM: &str = "You are an expert technical recruiter. \
    Analyze a job description and extract its requirements. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Schema shown to the model both for extraction and for output fixing.
pub const SKILLS_SCHEMA: &str = r#"{
  "technical_skills": ["string"],
  "soft_skills": ["string"],
  "experience": "string or number of years required, null if not mentioned",
  "education": ["string"],
  "certifications": ["string"]
}"#;

/// Skills extraction prompt template.
/// Replace: {schema}, {job_description}
pub const SKILLS_PROMPT_TEMPLATE: &str = r#"Extract the key skills and requirements from the job description below.

Return a JSON object with this EXACT schema (no extra fields):
{schema}

- technical_skills: technical skills required (languages, frameworks, tools, platforms)
- soft_skills: soft skills mentioned
- experience: years of experience required
- education: education requirements
- certifications: any certifications mentioned

JOB DESCRIPTION:
{job_description}"#;
