//! Axum route handlers for login and the Log and History views.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{LlmError, DEFAULT_MODEL};
use crate::session::history_view::{HistoryEdit, SaveOutcome};
use crate::session::log_view::{LogPatch, LogView};
use crate::session::CurrentSession;
use crate::state::AppState;
use crate::store::models::Accomplishment;
use crate::store::Mutation;

const DEFAULT_AUDIO_MIME: &str = "audio/wav";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

#[derive(Debug, Serialize)]
pub struct VoiceResponse {
    pub extracted: bool,
    pub log: LogView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
    pub log: LogView,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub rows: Vec<Accomplishment>,
}

#[derive(Debug, Deserialize)]
pub struct SaveHistoryRequest {
    pub edits: Vec<HistoryEdit>,
}

#[derive(Debug, Serialize)]
pub struct SaveHistoryResponse {
    pub outcome: SaveOutcome,
    pub rows: Vec<Accomplishment>,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/session/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = request.username.trim();
    let token = state
        .sessions
        .login(user, &request.password)
        .await
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(LoginResponse {
        token,
        user: user.to_string(),
    }))
}

/// POST /api/v1/session/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Json<LogoutResponse> {
    let logged_out = state.sessions.logout(&current.token).await;
    Json(LogoutResponse { logged_out })
}

// ────────────────────────────────────────────────────────────────────────────
// Log view
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/log
pub async fn handle_get_log(current: CurrentSession) -> Json<LogView> {
    Json(current.session.lock().await.log.clone())
}

/// PATCH /api/v1/log
///
/// Manual edits; they survive until submission or the next voice capture.
pub async fn handle_edit_log(
    current: CurrentSession,
    Json(patch): Json<LogPatch>,
) -> Json<LogView> {
    let mut session = current.session.lock().await;
    session.log.edit(patch);
    Json(session.log.clone())
}

/// POST /api/v1/log/voice
///
/// Multipart upload with an `audio` part (and an optional `model` part).
/// A transcription that yields nothing usable is reported, not an error:
/// the form is left as it was.
pub async fn handle_voice(
    State(state): State<AppState>,
    current: CurrentSession,
    mut multipart: Multipart,
) -> Result<Json<VoiceResponse>, AppError> {
    let mut audio = None;
    let mut model = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("audio") => {
                let mime = field
                    .content_type()
                    .unwrap_or(DEFAULT_AUDIO_MIME)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read audio: {e}")))?;
                audio = Some((bytes, mime));
            }
            Some("model") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read model: {e}")))?;
                model = Some(text.trim().to_string()).filter(|m| !m.is_empty());
            }
            _ => {}
        }
    }

    let Some((bytes, mime)) = audio.filter(|(bytes, _)| !bytes.is_empty()) else {
        return Err(AppError::Validation(
            "Please record or upload an audio clip.".to_string(),
        ));
    };
    if !state.llm.is_configured() {
        return Err(LlmError::NotConfigured.into());
    }

    let model = model.as_deref().unwrap_or(DEFAULT_MODEL);
    let fields = state
        .llm
        .complete_audio_to_fields(&bytes, &mime, model)
        .await;

    let mut session = current.session.lock().await;
    let (extracted, notice) = match fields {
        Some(fields) => {
            session
                .log
                .prefill(fields, chrono::Local::now().date_naive());
            info!("Pre-filled log form for {} from voice note", session.user);
            (true, None)
        }
        None => (
            false,
            Some("Could not extract details from the recording. Please fill in the form manually.".to_string()),
        ),
    };

    Ok(Json(VoiceResponse {
        extracted,
        log: session.log.clone(),
        notice,
    }))
}

/// POST /api/v1/log/submit
///
/// Persists the form. On failure the form keeps its contents.
pub async fn handle_submit_log(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<SubmitResponse>, AppError> {
    let mut guard = current.session.lock().await;
    let session = &mut *guard;

    session.log.validate().map_err(AppError::Validation)?;
    state.store.add(&session.log.form, &session.user).await?;
    session.log.clear();

    Ok(Json(SubmitResponse {
        message: "Accomplishment saved.".to_string(),
        log: session.log.clone(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// History view
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/history
///
/// Reloads the user's rows and keeps them as the snapshot later saves diff against.
pub async fn handle_get_history(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Json<HistoryResponse> {
    let mut guard = current.session.lock().await;
    let session = &mut *guard;
    let rows = session.history.load(&state.store, &session.user).await.to_vec();
    Json(HistoryResponse { rows })
}

/// POST /api/v1/history/save
pub async fn handle_save_history(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(request): Json<SaveHistoryRequest>,
) -> Result<Json<SaveHistoryResponse>, AppError> {
    let mut guard = current.session.lock().await;
    let session = &mut *guard;

    let outcome = session
        .history
        .save(&state.store, &session.user, &request.edits)
        .await?;

    Ok(Json(SaveHistoryResponse {
        outcome,
        rows: session.history.rows().to_vec(),
    }))
}

/// GET /api/v1/history/tags
pub async fn handle_tags(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Json<TagsResponse> {
    let user = current.session.lock().await.user.clone();
    Json(TagsResponse {
        tags: state.store.unique_tags(&user).await,
    })
}

/// GET /api/v1/history/:id
pub async fn handle_get_accomplishment(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<Accomplishment>, AppError> {
    let user = current.session.lock().await.user.clone();
    state
        .store
        .get_owned(&id, &user)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Accomplishment {id} not found")))
}

/// DELETE /api/v1/history/:id
///
/// An unknown id is a warning in a 200 response. The snapshot is reloaded
/// after a successful delete.
pub async fn handle_delete_accomplishment(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let mut guard = current.session.lock().await;
    let session = &mut *guard;

    match state.store.delete(&id, &session.user).await? {
        Mutation::Applied => {
            session.history.load(&state.store, &session.user).await;
            Ok(Json(DeleteResponse {
                deleted: true,
                warning: None,
            }))
        }
        Mutation::NotFound => {
            warn!("Delete of unknown entry {id} requested by {}", session.user);
            Ok(Json(DeleteResponse {
                deleted: false,
                warning: Some(format!("Entry with ID {id} not found.")),
            }))
        }
    }
}
