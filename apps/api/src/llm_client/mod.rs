//! LLM client, the single point of entry for all Gemini API calls in CareerOS.
//!
//! Constructed once at startup and carried in `AppState`. Without an API key
//! the client still exists but every completion returns `LlmError::NotConfigured`.
//!
//! No call is retried: a failure is returned to the caller as a value.

use std::sync::OnceLock;
use std::time::Duration;

use base64::Engine;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::llm_client::api::{
    ApiErrorEnvelope, Blob, Content, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, ListModelsResponse, Part,
};
use crate::llm_client::prompts::{compose_prompt, AUDIO_EXTRACTION_PROMPT, RAW_JSON_INSTRUCTION};
use crate::store::models::AccomplishmentFields;

pub mod api;
pub mod prompts;

pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
/// Returned by `list_models` when the backend cannot be asked.
pub const FALLBACK_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-flash-latest", "gemini-1.5-pro"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Gemini API not configured. Please check your API key.")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No candidates returned from Gemini.")]
    NoCandidates,

    #[error("Model stopped unexpectedly. Reason: {reason}. Safety Ratings: {safety_ratings}")]
    AbnormalStop {
        reason: String,
        safety_ratings: String,
    },

    #[error("Model returned no content parts. The input might have been blocked or interpreted as empty.")]
    EmptyContent,

    #[error("Error decoding JSON from model output: {message}")]
    MalformedJson { message: String, raw: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// Raw model text attached to a JSON decoding failure, for display to the user.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            LlmError::MalformedJson { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatusKind {
    Ok,
    RateLimited,
    Error,
    NotConfigured,
}

/// Result of the one-token health check.
#[derive(Debug, Clone, Serialize)]
pub struct ApiStatus {
    pub status: ApiStatusKind,
    pub message: String,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.into(),
            api_key,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Plain-text completion. Context, when present, is sent as a labelled block ahead of the task.
    pub async fn complete_text(
        &self,
        prompt: &str,
        context: Option<&str>,
        model: &str,
    ) -> Result<String, LlmError> {
        let full_prompt = compose_prompt(prompt, context);
        let response = self.generate(model, vec![text_part(full_prompt)], None).await?;
        checked_text(response)
    }

    /// Sends a voice note and extracts the accomplishment fields from the reply.
    ///
    /// The model is not guaranteed to emit pure JSON, so the reply is scanned for
    /// the first JSON object rather than parsed whole. Any failure yields `None`.
    pub async fn complete_audio_to_fields(
        &self,
        audio: &[u8],
        mime_type: &str,
        model: &str,
    ) -> Option<AccomplishmentFields> {
        let today = chrono::Local::now().date_naive().to_string();
        let prompt = AUDIO_EXTRACTION_PROMPT.replace("{today}", &today);
        let audio_part = Part {
            text: None,
            inline_data: Some(Blob {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(audio),
            }),
        };

        let text = match self
            .generate(model, vec![text_part(prompt), audio_part], None)
            .await
            .and_then(checked_text)
        {
            Ok(text) => text,
            Err(e) => {
                error!("Error processing audio: {e}");
                return None;
            }
        };

        let fields = extract_json_object(&text).map(|map| fields_from_map(&map));
        if fields.is_none() {
            warn!("Audio transcription reply contained no JSON object");
        }
        fields
    }

    /// JSON completion. The raw text is returned inside the error when it does not parse.
    pub async fn complete_structured(
        &self,
        prompt: &str,
        context: Option<&str>,
        model: &str,
    ) -> Result<Value, LlmError> {
        let full_prompt = compose_prompt(&format!("{prompt}{RAW_JSON_INSTRUCTION}"), context);
        let response = self.generate(model, vec![text_part(full_prompt)], None).await?;
        let text = checked_text(response)?;
        let cleaned = strip_json_fences(&text);

        serde_json::from_str(cleaned).map_err(|e| {
            error!("Error decoding JSON from model output: {e}");
            LlmError::MalformedJson {
                message: e.to_string(),
                raw: cleaned.to_string(),
            }
        })
    }

    /// Model ids supporting `generateContent`, sorted. Falls back to a static list.
    pub async fn list_models(&self) -> Vec<String> {
        let fallback = || FALLBACK_MODELS.iter().map(|m| m.to_string()).collect();

        let Some(api_key) = self.api_key.as_deref() else {
            return fallback();
        };

        let result: Result<ListModelsResponse, LlmError> = async {
            let mut url = self.url(&["models"])?;
            url.query_pairs_mut()
                .append_pair("key", api_key)
                .append_pair("pageSize", "1000");
            let response = self.client.get(url).send().await?;
            Ok(ensure_success(response).await?.json().await?)
        }
        .await;

        match result {
            Ok(listing) => {
                let mut models: Vec<String> = listing
                    .models
                    .into_iter()
                    .filter(|m| {
                        m.supported_generation_methods
                            .iter()
                            .any(|g| g == "generateContent")
                    })
                    .map(|m| m.name.trim_start_matches("models/").to_string())
                    .collect();
                models.sort();
                if models.is_empty() {
                    fallback()
                } else {
                    models
                }
            }
            Err(e) => {
                error!("Error fetching models: {e}");
                fallback()
            }
        }
    }

    /// Sends a minimal request to learn whether the API is reachable and within quota.
    pub async fn check_status(&self) -> ApiStatus {
        if !self.is_configured() {
            return ApiStatus {
                status: ApiStatusKind::NotConfigured,
                message: "API not configured".to_string(),
            };
        }

        let ping = self
            .generate(
                DEFAULT_MODEL,
                vec![text_part("test".to_string())],
                Some(GenerationConfig {
                    max_output_tokens: 1,
                }),
            )
            .await;

        match ping {
            Ok(_) => ApiStatus {
                status: ApiStatusKind::Ok,
                message: "API is operational".to_string(),
            },
            Err(e) => {
                let text = e.to_string();
                let lowered = text.to_lowercase();
                let rate_limited = matches!(e, LlmError::Api { status: 429, .. })
                    || lowered.contains("quota")
                    || lowered.contains("rate limit");
                if rate_limited {
                    ApiStatus {
                        status: ApiStatusKind::RateLimited,
                        message: "Rate limit or quota exceeded".to_string(),
                    }
                } else {
                    ApiStatus {
                        status: ApiStatusKind::Error,
                        message: format!("API error: {}", text.chars().take(100).collect::<String>()),
                    }
                }
            }
        }
    }

    async fn generate(
        &self,
        model: &str,
        parts: Vec<Part>,
        generation_config: Option<GenerationConfig>,
    ) -> Result<GenerateContentResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let model = model.trim();
        if model.is_empty() {
            return Err(LlmError::InvalidRequest("model name is empty".to_string()));
        }

        let mut url = self.url(&["models", &format!("{model}:generateContent")])?;
        url.query_pairs_mut().append_pair("key", api_key);

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            generation_config,
        };

        let response = self.client.post(url).json(&body).send().await?;
        let response: GenerateContentResponse = ensure_success(response).await?.json().await?;
        debug!(
            "Gemini call to {model} returned {} candidate(s)",
            response.candidates.len()
        );
        Ok(response)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, LlmError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| LlmError::InvalidRequest(format!("invalid Gemini base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| LlmError::InvalidRequest("Gemini base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn text_part(text: String) -> Part {
    Part {
        text: Some(text),
        inline_data: None,
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    warn!("Gemini API returned {status}: {message}");
    Err(LlmError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Applies the candidate checks shared by every completion mode and joins the text parts.
fn checked_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(LlmError::NoCandidates)?;

    let reason = candidate.finish_reason.as_deref().unwrap_or("STOP");
    if reason != "STOP" {
        let safety_ratings = candidate
            .safety_ratings
            .iter()
            .map(|r| format!("{}={}", r.category, r.probability))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(LlmError::AbnormalStop {
            reason: reason.to_string(),
            safety_ratings,
        });
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    if text.trim().is_empty() {
        return Err(LlmError::EmptyContent);
    }
    Ok(text)
}

fn object_start_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{").ok()).as_ref()
}

/// Finds the first JSON object embedded in free text. Braces that do not
/// open a parseable object (prose like `{if}`) are skipped.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    object_start_pattern()?.find_iter(text).find_map(|found| {
        let mut stream =
            serde_json::Deserializer::from_str(&text[found.start()..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

fn fields_from_map(map: &Map<String, Value>) -> AccomplishmentFields {
    let field = |key: &str| -> String {
        match map.get(key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };
    AccomplishmentFields {
        date: field("date"),
        category: field("category"),
        description: field("description"),
        impact_metric: field("impact_metric"),
        company: field("company"),
        title: field("title"),
    }
}

/// Strips ```json ... ``` or ``` ... ``` fences from either end of LLM output.
fn strip_json_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped.trim_start();
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped.trim_start();
    }
    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped.trim_end();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> LlmClient {
        LlmClient::new(Some("test-key".to_string()), base_url).unwrap()
    }

    fn text_reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    async fn mount_reply(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/models/gemini-flash-latest:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_unbalanced() {
        assert_eq!(strip_json_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_object_from_chatty_reply() {
        let reply = "Sure! Here you go:\n```json\n{\"date\": \"2024-01-10\", \"description\": \"Led migration\"}\n```\nLet me know {if} you need more.";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["description"], "Led migration");
    }

    #[test]
    fn test_extract_json_object_skips_braces_in_prose() {
        let reply = "Sure {here you go}: {\"description\": \"Led migration\", \"date\": \"2024-05-01\"}";
        let map = extract_json_object(reply).unwrap();
        assert_eq!(map["description"], "Led migration");
        assert_eq!(map["date"], "2024-05-01");
    }

    #[test]
    fn test_extract_json_object_none_without_object() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{ broken").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }

    #[test]
    fn test_fields_from_map_tolerates_nulls_and_numbers() {
        let map = json!({"date": null, "description": " Shipped ", "impact_metric": 20})
            .as_object()
            .cloned()
            .unwrap();
        let fields = fields_from_map(&map);
        assert_eq!(fields.date, "");
        assert_eq!(fields.description, "Shipped");
        assert_eq!(fields.impact_metric, "20");
        assert_eq!(fields.company, "");
    }

    #[tokio::test]
    async fn test_complete_text_sends_context_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-flash-latest:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{
                    "text": "Context Data:\nrows\n\nTask:\nSummarize"
                }]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("Done.")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server.uri())
            .complete_text("Summarize", Some("rows"), DEFAULT_MODEL)
            .await
            .unwrap();
        assert_eq!(text, "Done.");
    }

    #[tokio::test]
    async fn test_complete_text_reports_no_candidates() {
        let server = MockServer::start().await;
        mount_reply(&server, json!({ "candidates": [] })).await;

        let err = client(&server.uri())
            .complete_text("x", None, DEFAULT_MODEL)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NoCandidates));
        assert!(err.to_string().contains("No candidates"));
    }

    #[tokio::test]
    async fn test_complete_text_reports_abnormal_stop() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            json!({
                "candidates": [{
                    "finishReason": "SAFETY",
                    "safetyRatings": [{ "category": "HARM_CATEGORY_HARASSMENT", "probability": "HIGH" }]
                }]
            }),
        )
        .await;

        let err = client(&server.uri())
            .complete_text("x", None, DEFAULT_MODEL)
            .await
            .unwrap_err();
        match err {
            LlmError::AbnormalStop {
                reason,
                safety_ratings,
            } => {
                assert_eq!(reason, "SAFETY");
                assert!(safety_ratings.contains("HARM_CATEGORY_HARASSMENT=HIGH"));
            }
            other => panic!("expected AbnormalStop, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_text_reports_empty_parts() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            json!({ "candidates": [{ "content": { "parts": [] }, "finishReason": "STOP" }] }),
        )
        .await;

        let err = client(&server.uri())
            .complete_text("x", None, DEFAULT_MODEL)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn test_unconfigured_client_never_calls_out() {
        let unconfigured = LlmClient::new(None, "http://127.0.0.1:9").unwrap();
        let err = unconfigured
            .complete_text("x", None, DEFAULT_MODEL)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
        assert!(unconfigured
            .complete_audio_to_fields(b"RIFF", "audio/wav", DEFAULT_MODEL)
            .await
            .is_none());
        assert_eq!(unconfigured.check_status().await.status, ApiStatusKind::NotConfigured);
    }

    #[tokio::test]
    async fn test_structured_fenced_and_plain_replies_parse_identically() {
        let payload = r#"{"Fit Score": "High", "Company": "Acme"}"#;

        let plain_server = MockServer::start().await;
        mount_reply(&plain_server, text_reply(payload)).await;
        let fenced_server = MockServer::start().await;
        mount_reply(&fenced_server, text_reply(&format!("```json\n{payload}\n```"))).await;

        let plain = client(&plain_server.uri())
            .complete_structured("Generate", None, DEFAULT_MODEL)
            .await
            .unwrap();
        let fenced = client(&fenced_server.uri())
            .complete_structured("Generate", None, DEFAULT_MODEL)
            .await
            .unwrap();
        assert_eq!(plain, fenced);
        assert_eq!(plain["Company"], "Acme");
    }

    #[tokio::test]
    async fn test_structured_appends_raw_json_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("{}")))
            .mount(&server)
            .await;

        client(&server.uri())
            .complete_structured("Generate", None, DEFAULT_MODEL)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let sent = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(sent.starts_with("Generate"));
        assert!(sent.contains("Return your response ONLY as valid JSON"));
    }

    #[tokio::test]
    async fn test_structured_malformed_json_surfaces_raw_text() {
        let server = MockServer::start().await;
        mount_reply(&server, text_reply("I think you are a High fit!")).await;

        let err = client(&server.uri())
            .complete_structured("Generate", None, DEFAULT_MODEL)
            .await
            .unwrap_err();
        assert_eq!(err.raw_output(), Some("I think you are a High fit!"));
    }

    #[tokio::test]
    async fn test_audio_reply_is_scanned_for_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-flash-latest:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{}, { "inlineData": { "mimeType": "audio/wav", "data": "UklGRg==" } }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(
                "Here is the data: {\"date\": \"2024-01-10\", \"category\": \"Tech\", \"description\": \"Led migration\", \"impact_metric\": \"cut costs 20%\", \"company\": \"\", \"title\": \"\"} Hope that helps!",
            )))
            .mount(&server)
            .await;

        let fields = client(&server.uri())
            .complete_audio_to_fields(b"RIFF", "audio/wav", DEFAULT_MODEL)
            .await
            .unwrap();
        assert_eq!(fields.date, "2024-01-10");
        assert_eq!(fields.description, "Led migration");
        assert_eq!(fields.impact_metric, "cut costs 20%");
    }

    #[tokio::test]
    async fn test_audio_reply_without_json_is_none() {
        let server = MockServer::start().await;
        mount_reply(&server, text_reply("I could not hear anything.")).await;

        assert!(client(&server.uri())
            .complete_audio_to_fields(b"RIFF", "audio/wav", DEFAULT_MODEL)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_list_models_filters_and_sorts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    { "name": "models/gemini-pro", "supportedGenerationMethods": ["generateContent"] },
                    { "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] },
                    { "name": "models/gemini-flash-latest", "supportedGenerationMethods": ["generateContent", "countTokens"] }
                ]
            })))
            .mount(&server)
            .await;

        let models = client(&server.uri()).list_models().await;
        assert_eq!(models, vec!["gemini-flash-latest", "gemini-pro"]);
    }

    #[tokio::test]
    async fn test_list_models_falls_back_when_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let models = client(&server.uri()).list_models().await;
        assert_eq!(models, FALLBACK_MODELS.to_vec());
    }

    #[tokio::test]
    async fn test_check_status_detects_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted (e.g. check quota)." }
            })))
            .mount(&server)
            .await;

        let status = client(&server.uri()).check_status().await;
        assert_eq!(status.status, ApiStatusKind::RateLimited);
    }

    #[tokio::test]
    async fn test_check_status_ok_limits_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "generationConfig": { "maxOutputTokens": 1 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] }, "finishReason": "MAX_TOKENS" }]
            })))
            .mount(&server)
            .await;

        let status = client(&server.uri()).check_status().await;
        assert_eq!(status.status, ApiStatusKind::Ok);
    }
}
