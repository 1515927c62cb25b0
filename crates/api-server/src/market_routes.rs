use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use market_sim::Snapshot;
use serde::{Deserialize, Serialize};

use crate::{ApiResponse, AppState};

/// Symbols shown on the landing page when no list is requested.
pub const LISTING_SYMBOLS: [&str; 8] = ["INFY", "TCS", "RELI", "AAPL", "TSLA", "BTC", "ETH", "DOGE"];

#[derive(Deserialize)]
pub struct SnapshotQuery {
    /// Comma-separated symbols.
    pub symbols: Option<String>,
}

#[derive(Serialize)]
pub struct PriceResponse {
    pub symbol: String,
    pub price: f64,
}

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/api/market/snapshot", get(get_snapshot))
        .route("/api/market/price/:symbol", get(get_price))
        .route("/api/market/refresh", post(refresh_prices))
}

fn parse_symbols(raw: Option<&str>) -> Vec<String> {
    let symbols: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    if symbols.is_empty() {
        LISTING_SYMBOLS.iter().map(|s| s.to_string()).collect()
    } else {
        symbols
    }
}

async fn get_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Json<ApiResponse<Snapshot>> {
    let symbols = parse_symbols(query.symbols.as_deref());
    Json(ApiResponse::success(state.market.get_snapshot(&symbols)))
}

async fn get_price(State(state): State<AppState>, Path(symbol): Path<String>) -> Json<ApiResponse<PriceResponse>> {
    let symbol = symbol.trim().to_uppercase();
    let price = state.market.get_price(&symbol);
    Json(ApiResponse::success(PriceResponse { symbol, price }))
}

async fn refresh_prices(State(state): State<AppState>) -> Json<ApiResponse<Snapshot>> {
    state.market.update_prices();
    tracing::info!("Market prices refreshed on request");
    Json(ApiResponse::success(state.market.snapshot_all()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols() {
        assert_eq!(parse_symbols(Some("aapl, btc,,")), vec!["AAPL", "BTC"]);
        assert_eq!(parse_symbols(None).len(), 8);
        assert_eq!(parse_symbols(Some(" , ")), parse_symbols(None));
    }
}
