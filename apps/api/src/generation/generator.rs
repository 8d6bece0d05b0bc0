//! Resume generation: builds the history context and calls the completion client.
//!
//! Flow: validate job description → store.list(user) → context table →
//!       structured (JSON) or Markdown completion.
//!
//! Structured replies are validated into a `GeneratedProfile` here, so nothing
//! downstream ever sees the model's raw mapping.

use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::generation::profile::GeneratedProfile;
use crate::generation::prompts::{
    render_prompt, MARKDOWN_PROMPT_TEMPLATE, STRUCTURED_PROMPT_TEMPLATE,
};
use crate::llm_client::{LlmClient, DEFAULT_MODEL};
use crate::render::html::ContactInfo;
use crate::store::models::Accomplishment;
use crate::store::AccomplishmentStore;

const CONTEXT_COLUMNS: [&str; 6] = ["date", "category", "description", "impact_metric", "company", "title"];

/// Request body for both generation modes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerateRequest {
    pub job_description: String,
    pub target_audience: String,
    pub model: Option<String>,
    pub contact: ContactInfo,
}

impl GenerateRequest {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.job_description.trim().is_empty() {
            return Err(AppError::Validation(
                "Please provide a Job Description to tailor your resume and cover letter."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generation pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Structured mode: returns a validated profile ready to load into a draft.
pub async fn generate_profile(
    store: &AccomplishmentStore,
    llm: &LlmClient,
    user: &str,
    request: &GenerateRequest,
) -> Result<GeneratedProfile, AppError> {
    request.validate()?;
    let context = load_context(store, user).await?;

    let prompt = render_prompt(
        STRUCTURED_PROMPT_TEMPLATE,
        &request.job_description,
        &request.target_audience,
    );
    let value = llm
        .complete_structured(&prompt, Some(&context), request.model())
        .await?;
    let profile = GeneratedProfile::from_value(value)?;

    info!(
        "Generated profile for {user}: fit={:?}, {} job(s)",
        profile.fit_score,
        profile.resume.experience.len()
    );
    Ok(profile)
}

/// Plain-text mode: one Markdown document holding both assets.
pub async fn generate_markdown(
    store: &AccomplishmentStore,
    llm: &LlmClient,
    user: &str,
    request: &GenerateRequest,
) -> Result<String, AppError> {
    request.validate()?;
    let context = load_context(store, user).await?;

    let prompt = render_prompt(
        MARKDOWN_PROMPT_TEMPLATE,
        &request.job_description,
        &request.target_audience,
    );
    let markdown = llm
        .complete_text(&prompt, Some(&context), request.model())
        .await?;

    info!("Generated markdown profile for {user} ({} chars)", markdown.len());
    Ok(markdown)
}

async fn load_context(store: &AccomplishmentStore, user: &str) -> Result<String, AppError> {
    let records = store.list(user).await;
    if records.is_empty() {
        return Err(AppError::Validation(
            "No accomplishments found in database! Please log some achievements first."
                .to_string(),
        ));
    }
    Ok(build_context(&records))
}

/// Renders the history as a pipe-separated table, one row per accomplishment.
pub fn build_context(records: &[Accomplishment]) -> String {
    let mut out = CONTEXT_COLUMNS.join(" | ");
    for record in records {
        let cells = [
            &record.date,
            &record.category,
            &record.description,
            &record.impact_metric,
            &record.company,
            &record.title,
        ];
        out.push('\n');
        out.push_str(
            &cells
                .iter()
                .map(|c| c.replace(['\n', '|'], " "))
                .collect::<Vec<_>>()
                .join(" | "),
        );
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::generation::profile::tests::sample_response;
    use crate::store::backend::MemoryTable;
    use crate::store::models::{AccomplishmentFields, HEADER};

    async fn store_for(user: &str) -> AccomplishmentStore {
        let header = HEADER.iter().map(|h| h.to_string()).collect();
        let store = AccomplishmentStore::new(Arc::new(MemoryTable::with_rows(vec![header])));
        store
            .add(
                &AccomplishmentFields {
                    date: "2024-01-10".into(),
                    category: "Tech, Leadership".into(),
                    description: "Led migration".into(),
                    impact_metric: "cut costs 20%".into(),
                    company: "Globex".into(),
                    title: "Senior Engineer".into(),
                },
                user,
            )
            .await
            .unwrap();
        store
    }

    fn reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            job_description: "Staff engineer at Acme".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_context_table() {
        let record = Accomplishment {
            id: "1".into(),
            date: "2024-01-10".into(),
            category: "Tech".into(),
            description: "Led | migration\nfast".into(),
            impact_metric: "".into(),
            company: "Globex".into(),
            title: "".into(),
            user: "alice".into(),
        };
        let context = build_context(&[record]);
        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(lines[0], "date | category | description | impact_metric | company | title");
        assert_eq!(lines[1], "2024-01-10 | Tech | Led   migration fast |  | Globex | ");
    }

    #[test]
    fn test_model_defaults() {
        let mut req = request();
        assert_eq!(req.model(), DEFAULT_MODEL);
        req.model = Some("  ".into());
        assert_eq!(req.model(), DEFAULT_MODEL);
        req.model = Some("gemini-1.5-pro".into());
        assert_eq!(req.model(), "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn test_blank_job_description_rejected_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let llm = LlmClient::new(Some("k".into()), server.uri()).unwrap();
        let store = store_for("alice").await;

        let err = generate_profile(&store, &llm, "alice", &GenerateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_history_rejected() {
        let server = MockServer::start().await;
        let llm = LlmClient::new(Some("k".into()), server.uri()).unwrap();
        let store = store_for("alice").await;

        let err = generate_markdown(&store, &llm, "bob", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("No accomplishments")));
    }

    #[tokio::test]
    async fn test_generate_profile_validates_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(reply(&sample_response().to_string())),
            )
            .mount(&server)
            .await;
        let llm = LlmClient::new(Some("k".into()), server.uri()).unwrap();
        let store = store_for("alice").await;

        let profile = generate_profile(&store, &llm, "alice", &request()).await.unwrap();
        assert_eq!(profile.company, "Acme Corp");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let sent = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(sent.contains("Led migration"));
        assert!(sent.contains("Staff engineer at Acme"));
        assert!(sent.contains("TARGET AUDIENCE: Recruiters"));
    }

    #[tokio::test]
    async fn test_generate_profile_rejects_incomplete_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(r#"{"Fit Score": "High"}"#)))
            .mount(&server)
            .await;
        let llm = LlmClient::new(Some("k".into()), server.uri()).unwrap();
        let store = store_for("alice").await;

        let err = generate_profile(&store, &llm, "alice", &request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Profile(_)));
    }

    #[tokio::test]
    async fn test_generate_markdown_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply("## Tailored Resume\n...\n## Tailored Cover Letter\n...")),
            )
            .mount(&server)
            .await;
        let llm = LlmClient::new(Some("k".into()), server.uri()).unwrap();
        let store = store_for("alice").await;

        let markdown = generate_markdown(&store, &llm, "alice", &request()).await.unwrap();
        assert!(markdown.starts_with("## Tailored Resume"));
    }
}
