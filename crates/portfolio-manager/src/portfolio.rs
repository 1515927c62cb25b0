use market_sim::{round2, round_to};

use crate::db::PortfolioDb;
use crate::error::{LedgerError, LedgerResult};
use crate::models::*;

/// Remaining shares below this are treated as a closed holding.
const SHARE_EPSILON: f64 = 1e-9;

/// Sub-cent coins are shown with 6 decimals in the portfolio view.
fn display_precision(symbol: &str) -> u32 {
    match symbol {
        "DOGE" => 6,
        _ => 2,
    }
}

#[derive(Clone)]
pub struct PortfolioManager {
    db: PortfolioDb,
}

impl PortfolioManager {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    /// Get a reference to the database
    pub fn db(&self) -> &PortfolioDb {
        &self.db
    }

    pub async fn get_holdings(&self, user_id: i64) -> LedgerResult<Vec<Holding>> {
        let holdings = sqlx::query_as::<_, Holding>(
            "SELECT id, user_id, symbol, shares, avg_price FROM holdings WHERE user_id = ? ORDER BY symbol",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(holdings)
    }

    pub async fn get_holding(&self, user_id: i64, symbol: &str) -> LedgerResult<Option<Holding>> {
        let holding = sqlx::query_as::<_, Holding>(
            "SELECT id, user_id, symbol, shares, avg_price FROM holdings WHERE user_id = ? AND symbol = ?",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(holding)
    }

    /// Value every holding at the current price and add up net worth.
    pub async fn get_portfolio_summary<F>(&self, user_id: i64, price_fetcher: F) -> LedgerResult<PortfolioSummary>
    where
        F: Fn(&str) -> f64,
    {
        let (name, balance): (String, f64) = sqlx::query_as("SELECT name, balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))?;

        let mut total_value = 0.0;
        let mut holdings = Vec::new();
        for holding in self.get_holdings(user_id).await? {
            let price = price_fetcher(&holding.symbol);
            let value = price * holding.shares;
            total_value += value;

            holdings.push(HoldingValue {
                price: round_to(price, display_precision(&holding.symbol)),
                value: round2(value),
                symbol: holding.symbol,
                shares: holding.shares,
                avg: holding.avg_price,
            });
        }

        Ok(PortfolioSummary {
            user_id,
            name,
            balance,
            holdings,
            net: round2(balance + total_value),
        })
    }

    /// Buy or sell `quantity` shares of `symbol` at `price`.
    ///
    /// Cash and holding are updated in one transaction. Buying into an
    /// existing holding re-weights its average cost; selling the last share
    /// removes the holding.
    pub async fn execute_trade(
        &self,
        user_id: i64,
        symbol: &str,
        action: TradeAction,
        quantity: f64,
        price: f64,
    ) -> LedgerResult<TradeReceipt> {
        if symbol.is_empty() || !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::InvalidTrade);
        }

        let mut tx = self.db.pool().begin().await?;

        let (balance,): (f64,) = sqlx::query_as("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))?;

        let holding: Option<(f64, f64)> =
            sqlx::query_as("SELECT shares, avg_price FROM holdings WHERE user_id = ? AND symbol = ?")
                .bind(user_id)
                .bind(symbol)
                .fetch_optional(&mut *tx)
                .await?;

        let total = price * quantity;
        let (new_balance, holding_shares) = match action {
            TradeAction::Buy => {
                if balance < total {
                    return Err(LedgerError::InsufficientBalance);
                }

                let (shares, avg_price) = match holding {
                    Some((shares, avg)) => {
                        let shares_after = shares + quantity;
                        (shares_after, (avg * shares + price * quantity) / shares_after)
                    }
                    None => (quantity, price),
                };

                sqlx::query(
                    r#"
                    INSERT INTO holdings (user_id, symbol, shares, avg_price)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(user_id, symbol) DO UPDATE SET
                        shares = excluded.shares,
                        avg_price = excluded.avg_price
                    "#,
                )
                .bind(user_id)
                .bind(symbol)
                .bind(shares)
                .bind(avg_price)
                .execute(&mut *tx)
                .await?;

                (balance - total, shares)
            }
            TradeAction::Sell => {
                let shares = match holding {
                    Some((shares, _)) if shares >= quantity => shares - quantity,
                    _ => return Err(LedgerError::InsufficientShares),
                };
                // Fractional lots can leave float dust behind.
                let shares = if shares < SHARE_EPSILON { 0.0 } else { shares };

                if shares == 0.0 {
                    sqlx::query("DELETE FROM holdings WHERE user_id = ? AND symbol = ?")
                        .bind(user_id)
                        .bind(symbol)
                        .execute(&mut *tx)
                        .await?;
                } else {
                    sqlx::query("UPDATE holdings SET shares = ? WHERE user_id = ? AND symbol = ?")
                        .bind(shares)
                        .bind(user_id)
                        .bind(symbol)
                        .execute(&mut *tx)
                        .await?;
                }

                (balance + total, shares)
            }
        };

        sqlx::query("UPDATE users SET balance = ? WHERE id = ?")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let verb = match action {
            TradeAction::Buy => "Bought",
            TradeAction::Sell => "Sold",
        };
        let message = format!("{verb} {quantity} shares of {symbol} at ₹{price:.2}");
        tracing::info!(user_id, symbol, %action, quantity, price, "Trade executed");

        Ok(TradeReceipt {
            symbol: symbol.to_string(),
            action,
            shares: quantity,
            price,
            total,
            balance: new_balance,
            holding_shares,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountManager;

    async fn setup() -> (PortfolioManager, i64) {
        let db = PortfolioDb::new("sqlite::memory:").await.unwrap();
        let user = AccountManager::new(db.clone())
            .register("Trader", "trader@example.com", "pw")
            .await
            .unwrap();
        (PortfolioManager::new(db), user.id)
    }

    async fn balance(manager: &PortfolioManager, user_id: i64) -> f64 {
        let (balance,): (f64,) = sqlx::query_as("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(manager.db().pool())
            .await
            .unwrap();
        balance
    }

    #[tokio::test]
    async fn test_buy_creates_holding_and_debits_cash() {
        let (manager, user_id) = setup().await;

        let receipt = manager
            .execute_trade(user_id, "AAPL", TradeAction::Buy, 10.0, 180.0)
            .await
            .unwrap();

        assert_eq!(receipt.total, 1800.0);
        assert_eq!(receipt.balance, 98_200.0);
        assert_eq!(receipt.message, "Bought 10 shares of AAPL at ₹180.00");
        assert_eq!(balance(&manager, user_id).await, 98_200.0);

        let holding = manager.get_holding(user_id, "AAPL").await.unwrap().unwrap();
        assert_eq!(holding.shares, 10.0);
        assert_eq!(holding.avg_price, 180.0);
    }

    #[tokio::test]
    async fn test_buy_reweights_average_cost() {
        let (manager, user_id) = setup().await;

        manager.execute_trade(user_id, "TSLA", TradeAction::Buy, 10.0, 100.0).await.unwrap();
        manager.execute_trade(user_id, "TSLA", TradeAction::Buy, 30.0, 200.0).await.unwrap();

        let holding = manager.get_holding(user_id, "TSLA").await.unwrap().unwrap();
        assert_eq!(holding.shares, 40.0);
        assert_eq!(holding.avg_price, 175.0);
        assert_eq!(balance(&manager, user_id).await, 100_000.0 - 1_000.0 - 6_000.0);
    }

    #[tokio::test]
    async fn test_buy_rejects_insufficient_balance() {
        let (manager, user_id) = setup().await;

        let err = manager
            .execute_trade(user_id, "BTC", TradeAction::Buy, 2.0, 65_000.0)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance));
        assert_eq!(balance(&manager, user_id).await, 100_000.0);
        assert!(manager.get_holding(user_id, "BTC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_buy_exact_balance_is_allowed() {
        let (manager, user_id) = setup().await;

        let receipt = manager
            .execute_trade(user_id, "X", TradeAction::Buy, 1000.0, 100.0)
            .await
            .unwrap();
        assert_eq!(receipt.balance, 0.0);
    }

    #[tokio::test]
    async fn test_sell_partial_then_all() {
        let (manager, user_id) = setup().await;
        manager.execute_trade(user_id, "ETH", TradeAction::Buy, 4.0, 3500.0).await.unwrap();

        let receipt = manager
            .execute_trade(user_id, "ETH", TradeAction::Sell, 1.0, 4000.0)
            .await
            .unwrap();
        assert_eq!(receipt.holding_shares, 3.0);
        assert_eq!(receipt.message, "Sold 1 shares of ETH at ₹4000.00");
        assert_eq!(balance(&manager, user_id).await, 100_000.0 - 14_000.0 + 4_000.0);

        // Average cost is untouched by sells
        let holding = manager.get_holding(user_id, "ETH").await.unwrap().unwrap();
        assert_eq!(holding.avg_price, 3500.0);

        let receipt = manager
            .execute_trade(user_id, "ETH", TradeAction::Sell, 3.0, 4000.0)
            .await
            .unwrap();
        assert_eq!(receipt.holding_shares, 0.0);
        assert!(manager.get_holding(user_id, "ETH").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_selling_fractional_lots_closes_holding() {
        let (manager, user_id) = setup().await;
        manager.execute_trade(user_id, "BTC", TradeAction::Buy, 0.1, 100.0).await.unwrap();
        manager.execute_trade(user_id, "BTC", TradeAction::Buy, 0.2, 100.0).await.unwrap();

        let receipt = manager
            .execute_trade(user_id, "BTC", TradeAction::Sell, 0.3, 100.0)
            .await
            .unwrap();
        assert_eq!(receipt.holding_shares, 0.0);
        assert!(manager.get_holding(user_id, "BTC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sell_rejects_missing_or_short_holding() {
        let (manager, user_id) = setup().await;

        let err = manager
            .execute_trade(user_id, "INFY", TradeAction::Sell, 1.0, 1600.0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientShares));

        manager.execute_trade(user_id, "INFY", TradeAction::Buy, 2.0, 1600.0).await.unwrap();
        let err = manager
            .execute_trade(user_id, "INFY", TradeAction::Sell, 3.0, 1600.0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientShares));
    }

    #[tokio::test]
    async fn test_invalid_quantities() {
        let (manager, user_id) = setup().await;

        for qty in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = manager
                .execute_trade(user_id, "AAPL", TradeAction::Buy, qty, 180.0)
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidTrade));
        }

        let err = manager
            .execute_trade(user_id, "", TradeAction::Buy, 1.0, 180.0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTrade));
    }

    #[tokio::test]
    async fn test_portfolio_summary_values_holdings() {
        let (manager, user_id) = setup().await;
        manager.execute_trade(user_id, "AAPL", TradeAction::Buy, 10.0, 180.0).await.unwrap();
        manager.execute_trade(user_id, "DOGE", TradeAction::Buy, 1000.0, 0.15).await.unwrap();

        let summary = manager
            .get_portfolio_summary(user_id, |symbol| match symbol {
                "AAPL" => 181.8,
                "DOGE" => 0.1515,
                _ => 100.0,
            })
            .await
            .unwrap();

        assert_eq!(summary.name, "Trader");
        assert_eq!(summary.balance, 100_000.0 - 1_800.0 - 150.0);
        assert_eq!(summary.holdings.len(), 2);

        let aapl = &summary.holdings[0];
        assert_eq!(aapl.symbol, "AAPL");
        assert_eq!(aapl.price, 181.8);
        assert_eq!(aapl.value, 1818.0);
        assert_eq!(aapl.avg, 180.0);

        let doge = &summary.holdings[1];
        assert_eq!(doge.price, 0.1515);
        assert_eq!(doge.value, 151.5);

        assert_eq!(summary.net, round2(98_050.0 + 1818.0 + 151.5));
    }

    #[tokio::test]
    async fn test_portfolio_summary_unknown_user() {
        let (manager, _) = setup().await;
        let err = manager.get_portfolio_summary(999, |_| 1.0).await.unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(999)));
    }
}
