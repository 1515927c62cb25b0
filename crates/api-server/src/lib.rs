//! Teenvest HTTP API.
//!
//! The server is the composition root: it owns the one shared [`SharedMarket`]
//! and the ledger managers and hands them to every handler through
//! [`AppState`].

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use market_sim::{Market, SharedMarket};
use portfolio_manager::{AccountManager, DailyManager, LedgerError, PortfolioDb, PortfolioManager};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod brute_force;
pub mod config;
pub mod game_routes;
pub mod info_routes;
pub mod market_routes;
pub mod portfolio_routes;
pub mod quiz;
pub mod session;


use brute_force::LoginGuard;
use config::AppConfig;
use session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub market: SharedMarket,
    pub accounts: AccountManager,
    pub portfolio: PortfolioManager,
    pub daily: DailyManager,
    pub sessions: Arc<SessionStore>,
    pub login_guard: Arc<LoginGuard>,
}

impl AppState {
    /// Wire the managers around an already-open database and market.
    pub fn new(config: AppConfig, market: SharedMarket, db: PortfolioDb) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(
                Duration::from_secs(config.session_ttl_secs),
                config.max_sessions,
            )),
            login_guard: Arc::new(LoginGuard::from_config(&config)),
            accounts: AccountManager::new(db.clone()),
            portfolio: PortfolioManager::new(db.clone()),
            daily: DailyManager::new(db),
            market,
            config: Arc::new(config),
        }
    }

    /// Open the database and build a market from the configuration.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        if !PortfolioDb::exists(&config.database_url) {
            tracing::info!("Creating new ledger database at {}", config.database_url);
        }
        let db = PortfolioDb::new(&config.database_url).await?;

        let market = match config.market_seed {
            Some(seed) => {
                tracing::info!("Market running with fixed seed {}", seed);
                Market::seeded(seed)
            }
            None => Market::new(),
        };

        Ok(Self::new(config, SharedMarket::new(market), db))
    }
}

/// JSON envelope for every response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error rendered as an [`ApiResponse`] with a status code.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::EmailTaken | LedgerError::DailyAlreadyCompleted(_) => StatusCode::CONFLICT,
            LedgerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            LedgerError::UserNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InsufficientBalance
            | LedgerError::InsufficientShares
            | LedgerError::InvalidTrade
            | LedgerError::InvalidDailyResult => StatusCode::BAD_REQUEST,
            LedgerError::Database(_) | LedgerError::PasswordHash(_) => {
                tracing::error!("Ledger failure: {}", err);
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({ "status": "ok" })))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(market_routes::market_routes())
        .merge(auth::auth_routes())
        .merge(portfolio_routes::portfolio_routes())
        .merge(game_routes::game_routes())
        .merge(info_routes::info_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));
}

/// Periodic housekeeping: optional price refresh plus session and
/// login-guard expiry.
fn spawn_background_tasks(state: &AppState) {
    if state.config.price_refresh_secs > 0 {
        let market = state.market.clone();
        let period = Duration::from_secs(state.config.price_refresh_secs);
        tracing::info!("Refreshing all prices every {}s", period.as_secs());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                market.update_prices();
            }
        });
    }

    let sessions = state.sessions.clone();
    let login_guard = state.login_guard.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sessions.cleanup();
            login_guard.cleanup();
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Starting Teenvest API server");

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(config).await?;

    if state.config.seed_demo_users {
        let mut rng = StdRng::from_entropy();
        let created = state
            .accounts
            .seed_demo_users(state.config.demo_user_count, &mut rng)
            .await?;
        if created == 0 {
            tracing::info!("Existing accounts found, skipping demo players");
        }
    }

    spawn_background_tasks(&state);

    let addr: SocketAddr = state.config.bind_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
