// Provider-independent prompt fragments.
// Feature prompts live next to their service (answers/prompts.rs).

/// System prompt for the output-fixing round trip.
pub const JSON_ONLY_SYSTEM: &str = "You convert text into strict JSON. \
    Reply with exactly one JSON object and nothing before or after it. \
    No markdown, no code fences, no commentary.";

/// Output-fixing prompt: asks the model to rewrite its own malformed output.
/// Replace: {schema}, {raw_output}
pub const JSON_REPAIR_PROMPT_TEMPLATE: &str = r#"The text below was supposed to be a single JSON object matching this schema, but it could not be parsed.

SCHEMA:
{schema}

TEXT:
{raw_output}

Rewrite the text as ONE valid JSON object that follows the schema exactly.
Keep every value that was present in the text. Use [] for missing lists and null for missing values.
Return ONLY the JSON object."#;

/// Used by the connection check.
pub const CONNECTION_CHECK_PROMPT: &str =
    "Say hello and confirm that the API connection is working.";
