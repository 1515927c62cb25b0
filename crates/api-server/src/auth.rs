use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use portfolio_manager::{LedgerError, User, STARTING_BALANCE};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;

use crate::session::{session_limit_reached, with_session_header, SessionToken};
use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub message: String,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

pub fn current_user(state: &AppState, session: &SessionToken) -> Option<i64> {
    session.0.as_deref().and_then(|token| state.sessions.user_id(token))
}

/// Logged-in user of the session, or [`AuthError::LoginRequired`] carrying
/// `message`.
pub fn require_user(state: &AppState, session: &SessionToken, message: &'static str) -> Result<i64, AuthError> {
    current_user(state, session).ok_or(AuthError::LoginRequired(message))
}

/// Log the caller in under a freshly issued token.
fn start_session(state: &AppState, session: &SessionToken, user: User, message: String) -> Result<Response, AppError> {
    let token = state
        .sessions
        .rotate(session.0.as_deref(), user.id)
        .ok_or_else(session_limit_reached)?;

    let body = Json(ApiResponse::success(AuthResponse {
        user,
        token: token.clone(),
        message,
    }));
    Ok(with_session_header(&token, body))
}

async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Name, email and password are required"));
    }

    let user = state.accounts.register(&req.name, &req.email, &req.password).await?;
    let message = format!("Account created: ₹{} credited", STARTING_BALANCE);
    start_session(&state, &session, user, message)
}

async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let client = connect_info
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if state.login_guard.is_locked(&client) {
        return Err(AuthError::Locked.into());
    }

    let user = match state.accounts.authenticate(&req.email, &req.password).await {
        Ok(user) => {
            state.login_guard.record_success(&client);
            user
        }
        Err(LedgerError::InvalidCredentials) => {
            tracing::warn!("Failed login from {}", client);
            state.login_guard.record_failure(&client);
            return Err(LedgerError::InvalidCredentials.into());
        }
        Err(e) => return Err(e.into()),
    };

    let message = format!("Welcome back, {}", user.name);
    start_session(&state, &session, user, message)
}

async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
) -> Json<ApiResponse<serde_json::Value>> {
    if let Some(token) = session.0.as_deref() {
        state.sessions.clear(token);
    }
    Json(ApiResponse::success(json!({ "message": "Logged out" })))
}

async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user_id = require_user(&state, &session, "Login required")?;
    let user = state.accounts.get_user(user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Authentication errors
#[derive(Debug)]
pub enum AuthError {
    LoginRequired(&'static str),
    Locked,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::LoginRequired(message) => write!(f, "{}", message),
            AuthError::Locked => write!(f, "Too many failed login attempts"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::LoginRequired(_) => StatusCode::UNAUTHORIZED,
            AuthError::Locked => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::new(err.status(), err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}
