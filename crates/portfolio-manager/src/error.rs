use thiserror::Error;

/// Failures surfaced by account, trade and daily-challenge operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Not enough shares to sell")]
    InsufficientShares,

    #[error("Invalid trade")]
    InvalidTrade,

    #[error("Invalid daily challenge result")]
    InvalidDailyResult,

    #[error("Daily challenge already completed for {0}")]
    DailyAlreadyCompleted(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
