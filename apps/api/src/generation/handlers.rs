//! Axum route handlers for the Generate view and the completion helpers.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::generation::draft::{DraftEdit, ProfileDraft};
use crate::generation::generator::{generate_markdown, generate_profile, GenerateRequest};
use crate::generation::view::{DocumentKind, GenerateSnapshot, MARKDOWN_FILE_NAME};
use crate::llm_client::ApiStatus;
use crate::render::html::ContactInfo;
use crate::session::CurrentSession;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EditDraftRequest {
    pub version: u64,
    pub edits: Vec<DraftEdit>,
}

/// Generation request read from either a JSON body or a multipart form.
///
/// The form may carry the job description as a `job_description_file` part,
/// which must be UTF-8 text and is used when `job_description` is blank.
/// Contact details come as a `contact` JSON part or as separate
/// `name`/`email`/`phone`/`linkedin` parts.
pub struct GenerateInput(pub GenerateRequest);

#[async_trait]
impl<S> FromRequest<S> for GenerateInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            return read_generate_form(multipart).await.map(Self);
        }

        let Json(request) = Json::<GenerateRequest>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Self(request))
    }
}

async fn read_generate_form(mut multipart: Multipart) -> Result<GenerateRequest, AppError> {
    let mut request = GenerateRequest::default();
    let mut uploaded = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "job_description_file" {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;
            let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                AppError::Validation("The job description file must be UTF-8 text.".to_string())
            })?;
            uploaded = Some(text);
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read {name}: {e}")))?;
        match name.as_str() {
            "job_description" => request.job_description = text,
            "target_audience" => request.target_audience = text,
            "model" => request.model = Some(text),
            "contact" => {
                request.contact = serde_json::from_str(&text).map_err(|e| {
                    AppError::Validation(format!("contact must be a JSON object: {e}"))
                })?;
            }
            "name" => request.contact.name = text,
            "email" => request.contact.email = text,
            "phone" => request.contact.phone = text,
            "linkedin" => request.contact.linkedin = text,
            _ => {}
        }
    }

    if request.job_description.trim().is_empty() {
        if let Some(text) = uploaded {
            request.job_description = text;
        }
    }
    Ok(request)
}

#[derive(Debug, Serialize)]
pub struct MarkdownResponse {
    pub markdown: String,
    pub file_name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/generate
pub async fn handle_get_generate(current: CurrentSession) -> Json<GenerateSnapshot> {
    Json(current.session.lock().await.generate.snapshot())
}

/// POST /api/v1/generate
///
/// Structured mode. A validated profile replaces the current draft; any
/// failure leaves the previous draft and PDFs untouched.
pub async fn handle_generate(
    State(state): State<AppState>,
    current: CurrentSession,
    GenerateInput(request): GenerateInput,
) -> Result<Json<GenerateSnapshot>, AppError> {
    let mut session = current.session.lock().await;

    let profile = generate_profile(&state.store, &state.llm, &session.user, &request).await?;
    session.generate.load_profile(profile, request.contact);

    Ok(Json(session.generate.snapshot()))
}

/// POST /api/v1/generate/markdown
///
/// Plain-text mode: one Markdown document kept for download.
pub async fn handle_generate_markdown(
    State(state): State<AppState>,
    current: CurrentSession,
    GenerateInput(request): GenerateInput,
) -> Result<Json<MarkdownResponse>, AppError> {
    let mut session = current.session.lock().await;

    let markdown = generate_markdown(&state.store, &state.llm, &session.user, &request).await?;
    session.generate.set_markdown(markdown.clone());

    Ok(Json(MarkdownResponse {
        markdown,
        file_name: MARKDOWN_FILE_NAME,
    }))
}

/// GET /api/v1/generate/markdown/download
pub async fn handle_download_markdown(current: CurrentSession) -> Result<Response, AppError> {
    let session = current.session.lock().await;
    let markdown = session
        .generate
        .markdown()
        .ok_or_else(|| AppError::NotFound("No Markdown document has been generated".to_string()))?
        .to_string();

    Ok(attachment("text/markdown; charset=utf-8", MARKDOWN_FILE_NAME, markdown))
}

/// PATCH /api/v1/generate/draft
///
/// Applies a batch of edits against a specific draft version. A batch aimed
/// at an older version is rejected whole.
pub async fn handle_edit_draft(
    current: CurrentSession,
    Json(request): Json<EditDraftRequest>,
) -> Result<Json<ProfileDraft>, AppError> {
    let mut session = current.session.lock().await;
    let draft = session
        .generate
        .apply_edits(request.version, &request.edits)
        .ok_or_else(|| AppError::NotFound("Generate a profile before editing it".to_string()))??;

    Ok(Json(draft.clone()))
}

/// PUT /api/v1/generate/contact
pub async fn handle_set_contact(
    current: CurrentSession,
    Json(contact): Json<ContactInfo>,
) -> Json<GenerateSnapshot> {
    let mut session = current.session.lock().await;
    session.generate.set_contact(contact);
    Json(session.generate.snapshot())
}

/// POST /api/v1/generate/finalize
///
/// Assembles the included items and renders both PDFs. A document that fails
/// to render shows up as a notice in the snapshot.
pub async fn handle_finalize(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<GenerateSnapshot>, AppError> {
    let mut session = current.session.lock().await;
    let today = chrono::Local::now().date_naive();

    if session.generate.finalize(&state.renderer, today).is_none() {
        return Err(AppError::NotFound(
            "Generate a profile before finalizing it".to_string(),
        ));
    }

    Ok(Json(session.generate.snapshot()))
}

/// GET /api/v1/generate/pdf/:kind
pub async fn handle_download_pdf(
    current: CurrentSession,
    Path(kind): Path<String>,
) -> Result<Response, AppError> {
    let kind = DocumentKind::from_slug(&kind)
        .ok_or_else(|| AppError::NotFound(format!("Unknown document '{kind}'")))?;

    let session = current.session.lock().await;
    let pdf = session
        .generate
        .pdf(kind)
        .ok_or_else(|| AppError::NotFound("Document has not been rendered".to_string()))?;
    let file_name = session.generate.file_name(kind, &session.user);

    Ok(attachment("application/pdf", &file_name, pdf))
}

/// GET /api/v1/models
pub async fn handle_list_models(
    State(state): State<AppState>,
    _current: CurrentSession,
) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.llm.list_models().await,
    })
}

/// GET /api/v1/completion/status
pub async fn handle_completion_status(
    State(state): State<AppState>,
    _current: CurrentSession,
) -> Json<ApiStatus> {
    Json(state.llm.check_status().await)
}

fn attachment(content_type: &str, file_name: &str, body: impl IntoResponse) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}
