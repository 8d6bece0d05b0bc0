pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};

use crate::generation::handlers as generate;
use crate::session::handlers as session;
use crate::state::AppState;

/// Voice notes run well past axum's 2 MB default request body.
pub const VOICE_BODY_LIMIT: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session/login", post(session::handle_login))
        .route("/api/v1/session/logout", post(session::handle_logout))
        // Log view
        .route(
            "/api/v1/log",
            get(session::handle_get_log).patch(session::handle_edit_log),
        )
        .route(
            "/api/v1/log/voice",
            post(session::handle_voice).layer(DefaultBodyLimit::max(VOICE_BODY_LIMIT)),
        )
        .route("/api/v1/log/submit", post(session::handle_submit_log))
        // History view
        .route("/api/v1/history", get(session::handle_get_history))
        .route("/api/v1/history/save", post(session::handle_save_history))
        .route("/api/v1/history/tags", get(session::handle_tags))
        .route(
            "/api/v1/history/:id",
            get(session::handle_get_accomplishment).delete(session::handle_delete_accomplishment),
        )
        // Completion helpers
        .route("/api/v1/models", get(generate::handle_list_models))
        .route(
            "/api/v1/completion/status",
            get(generate::handle_completion_status),
        )
        // Generate view
        .route(
            "/api/v1/generate",
            get(generate::handle_get_generate).post(generate::handle_generate),
        )
        .route(
            "/api/v1/generate/markdown",
            post(generate::handle_generate_markdown),
        )
        .route(
            "/api/v1/generate/markdown/download",
            get(generate::handle_download_markdown),
        )
        .route("/api/v1/generate/draft", patch(generate::handle_edit_draft))
        .route("/api/v1/generate/contact", put(generate::handle_set_contact))
        .route("/api/v1/generate/finalize", post(generate::handle_finalize))
        .route(
            "/api/v1/generate/pdf/:kind",
            get(generate::handle_download_pdf),
        )
        .with_state(state)
}
