pub mod accounts;
pub mod daily;
pub mod db;
pub mod error;
pub mod models;
pub mod paper;
pub mod password;
pub mod portfolio;

pub use accounts::AccountManager;
pub use daily::{DailyChallenge, DailyManager};
pub use db::PortfolioDb;
pub use error::LedgerError;
pub use models::*;
pub use paper::{PaperAccount, PaperOutcome, PAPER_STOCKS};
pub use portfolio::PortfolioManager;

/// Cash credited to every newly registered account.
pub const STARTING_BALANCE: f64 = 100_000.0;
