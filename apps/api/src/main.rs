mod config;
mod errors;
mod generation;
mod llm_client;
mod render;
mod routes;
mod session;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, TableConfig};
use crate::llm_client::LlmClient;
use crate::render::DocumentRenderer;
use crate::routes::build_router;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::store::backend::{MemoryTable, TableBackend};
use crate::store::sheets::GoogleSheetsBackend;
use crate::store::AccomplishmentStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareerOS API v{}", env!("CARGO_PKG_VERSION"));

    // Remote table (connection is opened lazily on first use)
    let backend: Arc<dyn TableBackend> = match &config.table {
        TableConfig::Sheets(sheets) => Arc::new(GoogleSheetsBackend::new(sheets.clone())),
        TableConfig::Memory => {
            warn!("Using in-memory table; accomplishments are lost on restart");
            Arc::new(MemoryTable::new())
        }
    };
    let store = AccomplishmentStore::new(backend);
    if let Err(e) = store.init().await {
        warn!("Could not initialize accomplishments table: {e}");
    }

    // Completion client
    let llm = LlmClient::new(config.gemini_api_key.clone(), config.gemini_base_url.clone())?;
    if llm.is_configured() {
        info!(
            "Completion client initialized (default model: {})",
            llm_client::DEFAULT_MODEL
        );
    } else {
        warn!("GEMINI_API_KEY not set; generation and voice capture are disabled");
    }

    let state = AppState {
        store,
        llm,
        renderer: DocumentRenderer::default(),
        sessions: SessionStore::new(config.credentials.clone())
            .with_ttl(Duration::from_secs(config.session_ttl_minutes * 60)),
    };
    info!("Loaded {} user credential(s)", config.credentials.len());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
