//! Login sessions and the per-session view state.
//!
//! A session is created by a successful credential check and addressed by an
//! opaque bearer token. Each session's views sit behind one async mutex, so a
//! session handles a single interaction at a time. Sessions idle for longer
//! than the store's TTL are dropped, and logging in again replaces the user's
//! previous session.

pub mod handlers;
pub mod history_view;
pub mod log_view;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::view::GenerateView;
use crate::session::history_view::HistoryView;
use crate::session::log_view::LogView;
use crate::state::AppState;

/// View state owned by one logged-in user.
#[derive(Debug)]
pub struct Session {
    pub user: String,
    pub log: LogView,
    pub history: HistoryView,
    pub generate: GenerateView,
}

impl Session {
    fn new(user: String) -> Self {
        Self {
            user,
            log: LogView::new(chrono::Local::now().date_naive()),
            history: HistoryView::default(),
            generate: GenerateView::default(),
        }
    }
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

struct SessionEntry {
    user: String,
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    credentials: Arc<HashMap<String, String>>,
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(credentials: HashMap<String, String>) -> Self {
        Self {
            credentials: Arc::new(credentials),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Constant-time password check. Unknown users still pay for one comparison.
    pub fn verify(&self, user: &str, password: &str) -> bool {
        let (expected, known) = match self.credentials.get(user) {
            Some(expected) => (expected.as_str(), true),
            None => ("", false),
        };
        let matches: bool = expected.as_bytes().ct_eq(password.as_bytes()).into();
        known && matches
    }

    /// Returns a fresh session token, or `None` when the credentials are wrong.
    ///
    /// Expired sessions are swept first. The user's earlier session, if any,
    /// is replaced by the new one.
    pub async fn login(&self, user: &str, password: &str) -> Option<String> {
        if !self.verify(user, password) {
            warn!("Failed login attempt for user {user}");
            return None;
        }

        let now = Instant::now();
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.user != user && now - entry.last_seen < self.ttl);
        if sessions.len() < before {
            info!("Dropped {} stale session(s)", before - sessions.len());
        }
        sessions.insert(
            token.clone(),
            SessionEntry {
                user: user.to_string(),
                session: Arc::new(Mutex::new(Session::new(user.to_string()))),
                last_seen: now,
            },
        );
        info!("User {user} logged in");
        Some(token)
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Resolves a token and refreshes its idle timer. An expired session is removed.
    pub async fn get(&self, token: &str) -> Option<Arc<Mutex<Session>>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(token)?;
        if now - entry.last_seen >= self.ttl {
            info!("Session for {} expired", entry.user);
            sessions.remove(token);
            return None;
        }
        entry.last_seen = now;
        Some(entry.session.clone())
    }
}

/// Extractor for the caller's session, resolved from `Authorization: Bearer <token>`.
pub struct CurrentSession {
    pub token: String,
    pub session: Arc<Mutex<Session>>,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let session = state
            .sessions
            .get(token)
            .await
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentSession {
            token: token.to_string(),
            session,
        })
    }
}
