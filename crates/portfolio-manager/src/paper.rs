//! Fake-money account for the trade mini-game.
//!
//! Lives in the player's session, never touches the database, and trades
//! whole shares at snapshot prices.

use std::collections::BTreeMap;

use market_sim::Snapshot;
use serde::{Deserialize, Serialize};

use crate::models::TradeAction;

/// Symbols offered by the trade mini-game.
pub const PAPER_STOCKS: [&str; 7] = ["AAPL", "TSLA", "INFY", "TCS", "BTC", "ETH", "DOGE"];

pub const PAPER_STARTING_BALANCE: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperAccount {
    pub balance: f64,
    pub holdings: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperOutcome {
    pub accepted: bool,
    pub message: String,
}

impl PaperOutcome {
    pub fn rejected() -> Self {
        Self {
            accepted: false,
            message: "Invalid transaction.".to_string(),
        }
    }
}

impl Default for PaperAccount {
    fn default() -> Self {
        Self {
            balance: PAPER_STARTING_BALANCE,
            holdings: BTreeMap::new(),
        }
    }
}

impl PaperAccount {
    /// Apply a buy or sell priced from `prices`.
    ///
    /// Rejected transactions (unknown symbol, non-positive amount, not enough
    /// cash or shares) leave the account untouched.
    pub fn trade(&mut self, prices: &Snapshot, symbol: &str, action: TradeAction, amount: i64) -> PaperOutcome {
        let Some(quote) = prices.get(symbol) else {
            return PaperOutcome::rejected();
        };
        if amount <= 0 {
            return PaperOutcome::rejected();
        }

        let total = quote.price * amount as f64;
        match action {
            TradeAction::Buy if self.balance >= total => {
                *self.holdings.entry(symbol.to_string()).or_insert(0) += amount;
                self.balance -= total;
                PaperOutcome {
                    accepted: true,
                    message: format!("Bought {amount} shares of {symbol}!"),
                }
            }
            TradeAction::Sell if self.held(symbol) >= amount => {
                if let Some(shares) = self.holdings.get_mut(symbol) {
                    *shares -= amount;
                }
                self.balance += total;
                PaperOutcome {
                    accepted: true,
                    message: format!("Sold {amount} shares of {symbol}!"),
                }
            }
            _ => PaperOutcome::rejected(),
        }
    }

    pub fn held(&self, symbol: &str) -> i64 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }
}
