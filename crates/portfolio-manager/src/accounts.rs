use std::collections::HashMap;

use anyhow::Result;
use market_sim::round2;
use rand::Rng;

use crate::db::PortfolioDb;
use crate::error::{LedgerError, LedgerResult};
use crate::models::*;
use crate::password::{hash_password, verify_password};
use crate::STARTING_BALANCE;

const USER_COLUMNS: &str = "id, name, email, password_hash, balance, created_at";

/// Password given to every seeded demo player.
pub const DEMO_PASSWORD: &str = "demo";

#[derive(Clone)]
pub struct AccountManager {
    db: PortfolioDb,
}

impl AccountManager {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &PortfolioDb {
        &self.db
    }

    /// Create an account credited with the starting balance.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> LedgerResult<User> {
        let email = normalize_email(email);

        if self.find_by_email(&email).await?.is_some() {
            return Err(LedgerError::EmailTaken);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash, balance) VALUES (?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        ))
        .bind(name.trim())
        .bind(&email)
        .bind(hash_password(password)?)
        .bind(STARTING_BALANCE)
        .fetch_one(self.db.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => LedgerError::EmailTaken,
            other => LedgerError::Database(other),
        })?;

        tracing::info!(user_id = user.id, "Registered new account");
        Ok(user)
    }

    /// Look up the account for `email` and check its password.
    pub async fn authenticate(&self, email: &str, password: &str) -> LedgerResult<User> {
        let email = normalize_email(email);

        match self.find_by_email(&email).await? {
            Some(user) if verify_password(password, &user.password_hash) => Ok(user),
            _ => Err(LedgerError::InvalidCredentials),
        }
    }

    pub async fn get_user(&self, user_id: i64) -> LedgerResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    pub async fn find_by_email(&self, email: &str) -> LedgerResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(normalize_email(email))
            .fetch_optional(self.db.pool())
            .await?;

        Ok(user)
    }

    pub async fn count_users(&self) -> LedgerResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    /// Populate an empty database with `count` demo players.
    ///
    /// Does nothing when any account already exists. Returns the number of
    /// accounts created.
    pub async fn seed_demo_users<R: Rng>(&self, count: usize, rng: &mut R) -> Result<usize> {
        if self.count_users().await? > 0 {
            return Ok(0);
        }

        // Every demo player shares one password, so hash it once.
        let password_hash = hash_password(DEMO_PASSWORD)?;

        let mut tx = self.db.pool().begin().await?;
        for i in 1..=count {
            let balance = round2(50_000.0 + rng.gen::<f64>() * 200_000.0);
            sqlx::query("INSERT INTO users (name, email, password_hash, balance) VALUES (?, ?, ?, ?)")
                .bind(format!("Demo{i:03}"))
                .bind(format!("demo{i:03}@example.com"))
                .bind(&password_hash)
                .bind(balance)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!("Seeded {} demo players", count);
        Ok(count)
    }

    /// Top accounts by net worth (cash plus holdings at current prices).
    pub async fn leaderboard<F>(&self, limit: usize, price_fetcher: F) -> LedgerResult<Vec<LeaderboardEntry>>
    where
        F: Fn(&str) -> f64,
    {
        let users: Vec<(i64, String, f64)> = sqlx::query_as("SELECT id, name, balance FROM users")
            .fetch_all(self.db.pool())
            .await?;
        let holdings: Vec<(i64, String, f64)> = sqlx::query_as("SELECT user_id, symbol, shares FROM holdings")
            .fetch_all(self.db.pool())
            .await?;

        let mut prices: HashMap<String, f64> = HashMap::new();
        let mut holding_value: HashMap<i64, f64> = HashMap::new();
        for (user_id, symbol, shares) in holdings {
            let price = *prices
                .entry(symbol)
                .or_insert_with_key(|symbol| price_fetcher(symbol));
            *holding_value.entry(user_id).or_default() += price * shares;
        }

        let mut ranked: Vec<(String, f64)> = users
            .into_iter()
            .map(|(id, name, balance)| {
                let net = balance + holding_value.get(&id).copied().unwrap_or(0.0);
                (name, round2(net))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (name, net_worth))| LeaderboardEntry {
                rank: i + 1,
                name,
                net_worth,
            })
            .collect())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
