// Cross-cutting prompt fragments for the completion client.
// Feature prompts (resume generation) live next to their callers.

/// Appended to every structured request.
pub const RAW_JSON_INSTRUCTION: &str = "\n\nCRITICAL: Return your response ONLY as valid JSON. \
    Do not include markdown formatting like ```json ... ```. Just the raw JSON string.";

/// Voice-note extraction. Replace `{today}` before sending.
pub const AUDIO_EXTRACTION_PROMPT: &str = r#"Analyze this audio recording of someone describing a professional accomplishment.
Extract the following information and return it ONLY as a valid JSON object:
{
    "date": "YYYY-MM-DD (use today's date if not specified)",
    "category": "Comma-separated tags/categories",
    "description": "Standardized, professional description of what was done",
    "impact_metric": "Specific quantifiable impact mentioned",
    "company": "Company name if mentioned",
    "title": "Job title if mentioned"
}

Today's date is: {today}

If a field is not mentioned, provide an empty string or logical default.
Result must be ONLY the JSON block."#;

/// Builds the final prompt text, prefixing the optional context block.
pub fn compose_prompt(prompt: &str, context: Option<&str>) -> String {
    match context.filter(|c| !c.trim().is_empty()) {
        Some(context) => format!("Context Data:\n{context}\n\nTask:\n{prompt}"),
        None => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_prompt_with_context() {
        let composed = compose_prompt("Write it", Some("row 1"));
        assert_eq!(composed, "Context Data:\nrow 1\n\nTask:\nWrite it");
    }

    #[test]
    fn test_blank_context_is_dropped() {
        assert_eq!(compose_prompt("Write it", Some("  ")), "Write it");
        assert_eq!(compose_prompt("Write it", None), "Write it");
    }
}
