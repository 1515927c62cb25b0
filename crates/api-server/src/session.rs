use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use portfolio_manager::PaperAccount;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::{AppError, AppState};

/// Header carrying the session token in both directions.
pub const SESSION_HEADER: &str = "x-session-token";

/// Per-client state kept between requests.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub user_id: Option<i64>,
    pub paper: Option<PaperAccount>,
}

struct SessionEntry {
    data: SessionData,
    last_seen: Instant,
}

/// Live session named by the request's `x-session-token`, if any.
#[derive(Clone, Debug, Default)]
pub struct SessionToken(pub Option<String>);

/// In-process session table keyed by opaque tokens.
///
/// Sessions are only opened by handlers that need one (login, register,
/// trade game), never by plain reads.
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            max_sessions,
        }
    }

    fn open(&self, data: SessionData) -> Option<String> {
        if self.sessions.len() >= self.max_sessions {
            self.cleanup();
            if self.sessions.len() >= self.max_sessions {
                tracing::warn!("Session table full ({} sessions)", self.max_sessions);
                return None;
            }
        }

        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                data,
                last_seen: Instant::now(),
            },
        );
        Some(token)
    }

    /// Start an empty session and return its token, or `None` when full.
    pub fn create(&self) -> Option<String> {
        self.open(SessionData::default())
    }

    /// Reuse `token` if it names a live session, otherwise open a new one.
    pub fn get_or_create(&self, token: Option<&str>) -> Option<String> {
        match token {
            Some(token) if self.sessions.contains_key(token) => Some(token.to_string()),
            _ => self.create(),
        }
    }

    /// Move the session behind `old` to a fresh token logged in as `user_id`.
    ///
    /// The old token stops working; the paper account carries over.
    pub fn rotate(&self, old: Option<&str>, user_id: i64) -> Option<String> {
        let mut data = old
            .and_then(|token| self.sessions.remove(token))
            .map(|(_, entry)| entry.data)
            .unwrap_or_default();
        data.user_id = Some(user_id);
        self.open(data)
    }

    /// Refresh `token` if it names a live session.
    pub fn touch(&self, token: &str) -> bool {
        match self.sessions.get_mut(token) {
            Some(mut entry) => {
                entry.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, token: &str) -> Option<SessionData> {
        self.sessions.get(token).map(|entry| entry.data.clone())
    }

    pub fn user_id(&self, token: &str) -> Option<i64> {
        self.sessions.get(token).and_then(|entry| entry.data.user_id)
    }

    /// Forget everything stored in the session, paper account included.
    pub fn clear(&self, token: &str) {
        if let Some(mut entry) = self.sessions.get_mut(token) {
            entry.data = SessionData::default();
        }
    }

    /// Run `f` against the session's paper account, opening one on first use.
    pub fn with_paper<T>(&self, token: &str, f: impl FnOnce(&mut PaperAccount) -> T) -> Option<T> {
        let mut entry = self.sessions.get_mut(token)?;
        Some(f(entry.data.paper.get_or_insert_with(PaperAccount::default)))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle for longer than the TTL.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now.duration_since(entry.last_seen) < self.ttl);

        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!("Expired {} idle sessions", removed);
        }
    }
}

pub fn session_limit_reached() -> AppError {
    AppError::new(StatusCode::SERVICE_UNAVAILABLE, "Too many active sessions, try again later")
}

/// Respond with `body`, handing the client `token` as its session.
pub fn with_session_header(token: &str, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    if let Ok(val) = HeaderValue::from_str(token) {
        response.headers_mut().insert(SESSION_HEADER, val);
    }
    response
}

/// Attach the caller's live session, if it sent one, to every request.
///
/// Unknown or expired tokens are ignored. A live token is echoed on the
/// response unless the handler issued a different one.
pub async fn session_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|token| state.sessions.touch(token))
        .map(|token| token.to_string());

    request.extensions_mut().insert(SessionToken(token.clone()));

    let mut response = next.run(request).await;
    if let Some(token) = token {
        if !response.headers().contains_key(SESSION_HEADER) {
            if let Ok(val) = HeaderValue::from_str(&token) {
                response.headers_mut().insert(SESSION_HEADER, val);
            }
        }
    }

    response
}
