use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub balance: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Holding {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub shares: f64,
    pub avg_price: f64,
}

/// A holding valued at the current market price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingValue {
    pub symbol: String,
    pub shares: f64,
    pub avg: f64,
    pub price: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub user_id: i64,
    pub name: String,
    pub balance: f64,
    pub holdings: Vec<HoldingValue>,
    pub net: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for TradeAction {
    type Err = crate::LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            _ => Err(crate::LedgerError::InvalidTrade),
        }
    }
}

/// Result of an executed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub symbol: String,
    pub action: TradeAction,
    pub shares: f64,
    pub price: f64,
    pub total: f64,
    pub balance: f64,
    /// Shares held after the trade; zero when the holding was closed.
    pub holding_shares: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyRecord {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub result_value: f64,
    pub reward: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub net_worth: f64,
}
