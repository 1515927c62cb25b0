use chrono::{Datelike, NaiveDate};
use market_sim::round2;
use serde::{Deserialize, Serialize};

use crate::db::PortfolioDb;
use crate::error::{LedgerError, LedgerResult};
use crate::models::DailyRecord;

/// Starting stake of every daily challenge.
pub const DAILY_START: f64 = 5000.0;

/// Seconds a player has to reach the target.
pub const DAILY_DURATION_SECS: u32 = 120;

/// Parameters of the challenge for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChallenge {
    pub date: String,
    pub start: f64,
    pub target: f64,
    pub duration: u32,
}

impl DailyChallenge {
    /// The target growth cycles through 5%..=14% with the day number.
    pub fn for_date(date: NaiveDate) -> Self {
        // 0001-01-01 is day 1
        let seed = date.num_days_from_ce() % 10 + 5;
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            start: DAILY_START,
            target: round2(DAILY_START * (1.0 + f64::from(seed) / 100.0)),
            duration: DAILY_DURATION_SECS,
        }
    }

    /// Profit over the start when the target was reached, otherwise nothing.
    pub fn reward_for(&self, result_value: f64) -> f64 {
        if result_value >= self.target {
            round2(result_value - self.start)
        } else {
            0.0
        }
    }
}

#[derive(Clone)]
pub struct DailyManager {
    db: PortfolioDb,
}

impl DailyManager {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    pub async fn get_record(&self, user_id: i64, date: NaiveDate) -> LedgerResult<Option<DailyRecord>> {
        let record = sqlx::query_as::<_, DailyRecord>(
            "SELECT id, user_id, date, result_value, reward FROM daily_records WHERE user_id = ? AND date = ?",
        )
        .bind(user_id)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(record)
    }

    /// Record the player's result for `date` and credit any reward.
    ///
    /// One submission per player per day.
    pub async fn submit(&self, user_id: i64, date: NaiveDate, result_value: f64) -> LedgerResult<DailyRecord> {
        if !result_value.is_finite() || result_value < 0.0 {
            return Err(LedgerError::InvalidDailyResult);
        }

        let challenge = DailyChallenge::for_date(date);
        let reward = challenge.reward_for(result_value);

        let mut tx = self.db.pool().begin().await?;

        let inserted = sqlx::query_as::<_, DailyRecord>(
            r#"
            INSERT INTO daily_records (user_id, date, result_value, reward)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, date) DO NOTHING
            RETURNING id, user_id, date, result_value, reward
            "#,
        )
        .bind(user_id)
        .bind(&challenge.date)
        .bind(result_value)
        .bind(reward)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = inserted else {
            return Err(LedgerError::DailyAlreadyCompleted(challenge.date));
        };

        let updated = sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(reward)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::UserNotFound(user_id));
        }

        tx.commit().await?;

        tracing::info!(user_id, date = %challenge.date, result_value, reward, "Daily challenge submitted");
        Ok(record)
    }
}
