use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use market_sim::Movement;
use portfolio_manager::{LedgerError, PortfolioSummary, TradeAction, TradeReceipt};
use serde::{Deserialize, Serialize};

use crate::auth::require_user;
use crate::market_routes::LISTING_SYMBOLS;
use crate::session::SessionToken;
use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct TradeRequest {
    pub asset: String,
    pub action: String,
    #[serde(default)]
    pub quantity: f64,
}

#[derive(Serialize)]
pub struct TradeResponse {
    #[serde(flatten)]
    pub receipt: TradeReceipt,
    /// Market reaction to the trade.
    pub movement: Movement,
}

pub fn portfolio_routes() -> Router<AppState> {
    Router::new()
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/trade", post(trade))
}

async fn get_portfolio(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
) -> Result<Json<ApiResponse<PortfolioSummary>>, AppError> {
    let user_id = require_user(&state, &session, "Login to view portfolio")?;

    let market = state.market.clone();
    let summary = state
        .portfolio
        .get_portfolio_summary(user_id, |symbol| market.get_price(symbol))
        .await?;

    Ok(Json(ApiResponse::success(summary)))
}

async fn trade(
    State(state): State<AppState>,
    Extension(session): Extension<SessionToken>,
    Json(req): Json<TradeRequest>,
) -> Result<Json<ApiResponse<TradeResponse>>, AppError> {
    let user_id = require_user(&state, &session, "Login to trade")?;

    let symbol = req.asset.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::InvalidTrade.into());
    }
    if !LISTING_SYMBOLS.contains(&symbol.as_str()) {
        return Err(AppError::bad_request("Unknown symbol"));
    }
    let price = state.market.get_price(&symbol);

    let result = match req.action.trim().to_lowercase().parse::<TradeAction>() {
        Ok(action) => {
            state
                .portfolio
                .execute_trade(user_id, &symbol, action, req.quantity, price)
                .await
        }
        Err(e) => Err(e),
    };

    // The market reacts to every attempt, accepted or not.
    let movement = state.market.simulate_movement(&symbol);

    match result {
        Ok(receipt) => {
            tracing::info!(
                "User {} {} {} {} @ {:.2}",
                user_id,
                receipt.action,
                receipt.shares,
                receipt.symbol,
                receipt.price
            );
            Ok(Json(ApiResponse::success(TradeResponse { receipt, movement })))
        }
        Err(e) => {
            tracing::debug!("Trade rejected for user {}: {}", user_id, e);
            Err(e.into())
        }
    }
}
