use crate::llm_client::LlmClient;
use crate::render::DocumentRenderer;
use crate::session::SessionStore;
use crate::store::AccomplishmentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: AccomplishmentStore,
    pub llm: LlmClient,
    /// HTML to PDF rendering for the Generate view.
    pub renderer: DocumentRenderer,
    pub sessions: SessionStore,
}
