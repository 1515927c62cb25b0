use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use market_sim::{round2, Snapshot};
use portfolio_manager::{DailyChallenge, DailyRecord, PaperAccount, PaperOutcome, TradeAction, PAPER_STOCKS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::{current_user, require_user};
use crate::market_routes::LISTING_SYMBOLS;
use crate::session::{session_limit_reached, with_session_header, SessionToken};
use crate::{ApiResponse, AppError, AppState};

/// Coins offered by the crypto guessing game.
pub const CRYPTO_CHOICES: [&str; 3] = ["BTC", "ETH", "DOGE"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Guess {
    #[default]
    Up,
    Down,
}

#[derive(Deserialize)]
pub struct GuessRequest {
    pub symbol: Option<String>,
    #[serde(default)]
    pub guess: Guess,
}

#[derive(Serialize)]
pub struct GuessResult {
    pub symbol: String,
    pub guess: Guess,
    pub previous_price: f64,
    pub new_price: f64,
    pub step: f64,
    pub correct: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct CryptoGameInfo {
    pub choices: Vec<&'static str>,
    pub prices: Snapshot,
}

#[derive(Deserialize)]
pub struct TradeGameRequest {
    pub symbol: String,
    pub action: String,
    #[serde(default)]
    pub amount: i64,
}

#[derive(Serialize)]
pub struct TradeGameView {
    pub stocks: Vec<&'static str>,
    pub prices: Snapshot,
    pub holdings: BTreeMap<String, i64>,
    pub balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct DailySubmission {
    pub result_value: f64,
}

#[derive(Serialize)]
pub struct DailyStatus {
    #[serde(flatten)]
    pub challenge: DailyChallenge,
    pub done: bool,
    pub record: Option<DailyRecord>,
}

pub fn game_routes() -> Router<AppState> {
    Router::new()
        .route("/api/game", post(stock_game))
        .route("/api/crypto-game", get(crypto_game_info).post(crypto_game))
        .route("/api/trade-game", get(trade_game_view).post(trade_game))
        .route("/api/daily", get(daily_status).post(daily_submit))
}

/// Run one round on `symbol`, which must be one of `choices`.
fn play_guess(
    state: &AppState,
    symbol: Option<String>,
    choices: &[&str],
    default_symbol: &str,
    guess: Guess,
) -> Result<GuessResult, AppError> {
    let symbol = symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default_symbol.to_string());
    if !choices.contains(&symbol.as_str()) {
        return Err(AppError::bad_request("Unknown symbol"));
    }

    let previous_price = round2(state.market.get_price(&symbol));
    let movement = state.market.simulate_movement(&symbol);

    let correct = match guess {
        Guess::Up => movement.is_up(),
        Guess::Down => movement.is_down(),
    };
    let verdict = if correct { "Correct!" } else { "Incorrect!" };

    Ok(GuessResult {
        message: format!("{} {} moved to ₹{:.2}.", verdict, symbol, movement.new_price),
        symbol,
        guess,
        previous_price,
        new_price: movement.new_price,
        step: movement.step,
        correct,
    })
}

async fn stock_game(
    State(state): State<AppState>,
    Json(req): Json<GuessRequest>,
) -> Result<Json<ApiResponse<GuessResult>>, AppError> {
    let result = play_guess(&state, req.symbol, &LISTING_SYMBOLS, "AAPL", req.guess)?;
    Ok(Json(ApiResponse::success(result)))
}

async fn crypto_game_info(State(state): State<AppState>) -> Json<ApiResponse<CryptoGameInfo>> {
    Json(ApiResponse::success(CryptoGameInfo {
        choices: CRYPTO_CHOICES.to_vec(),
        prices: state.market.get_snapshot(CRYPTO_CHOICES),
    }))
}

async fn crypto_game(
    State(state): State<AppState>,
    Json(req): Json<GuessRequest>,
) -> Result<Json<ApiResponse<GuessResult>>, AppError> {
    let result = play_guess(&state, req.symbol, &CRYPTO_CHOICES, "BTC", req.guess)?;
    Ok(Json(ApiResponse::success(result)))
}

fn paper_view(prices: Snapshot, paper: &PaperAccount, message: Option<String>) -> TradeGameView {
    TradeGameView {
        stocks: PAPER_STOCKS.to_vec(),
        prices,
        holdings: paper.holdings.clone(),
        balance: round2(paper.balance),
        message,
    }
}

fn session_expired() -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "Session expired")
}

async fn trade_game_view(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
) -> Result<Response, AppError> {
    let token = state
        .sessions
        .get_or_create(session.0.as_deref())
        .ok_or_else(session_limit_reached)?;

    let prices = state.market.get_snapshot(PAPER_STOCKS);
    let view = state
        .sessions
        .with_paper(&token, |paper| paper_view(prices, paper, None))
        .ok_or_else(session_expired)?;

    Ok(with_session_header(&token, Json(ApiResponse::success(view))))
}

async fn trade_game(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<TradeGameRequest>,
) -> Result<Response, AppError> {
    let token = state
        .sessions
        .get_or_create(session.0.as_deref())
        .ok_or_else(session_limit_reached)?;

    let prices = state.market.get_snapshot(PAPER_STOCKS);
    let symbol = req.symbol.trim().to_uppercase();
    let action = req.action.trim().to_lowercase().parse::<TradeAction>();

    let view = state
        .sessions
        .with_paper(&token, |paper| {
            let outcome = match action {
                Ok(action) => paper.trade(&prices, &symbol, action, req.amount),
                Err(_) => PaperOutcome::rejected(),
            };
            paper_view(prices.clone(), paper, Some(outcome.message))
        })
        .ok_or_else(session_expired)?;

    Ok(with_session_header(&token, Json(ApiResponse::success(view))))
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

async fn daily_status(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
) -> Result<Json<ApiResponse<DailyStatus>>, AppError> {
    let date = today();
    let record = match current_user(&state, &session) {
        Some(user_id) => state.daily.get_record(user_id, date).await?,
        None => None,
    };

    Ok(Json(ApiResponse::success(DailyStatus {
        challenge: DailyChallenge::for_date(date),
        done: record.is_some(),
        record,
    })))
}

async fn daily_submit(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<DailySubmission>,
) -> Result<Json<ApiResponse<DailyStatus>>, AppError> {
    let user_id = require_user(&state, &session, "Login to play the daily challenge")?;
    let date = today();

    let record = state.daily.submit(user_id, date, req.result_value).await?;

    Ok(Json(ApiResponse::success(DailyStatus {
        challenge: DailyChallenge::for_date(date),
        done: true,
        record: Some(record),
    })))
}
