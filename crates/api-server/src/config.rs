use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Server
    pub host: String,
    pub port: u16,

    // Database
    pub database_url: String,
    pub seed_demo_users: bool,
    pub demo_user_count: usize,

    // Market
    pub price_refresh_secs: u64, // 0 disables the background refresh
    pub market_seed: Option<u64>,

    // Sessions and login lockout
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
    pub auth_max_failures: u32,
    pub auth_failure_window_secs: u64,
    pub auth_lockout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: "sqlite:teenvest.db".to_string(),
            seed_demo_users: true,
            demo_user_count: 100,
            price_refresh_secs: 0,
            market_seed: None,
            session_ttl_secs: 86_400,
            max_sessions: 10_000,
            auth_max_failures: 5,
            auth_failure_window_secs: 300,
            auth_lockout_secs: 900,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("PORT must be a port number")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:teenvest.db".to_string()),
            seed_demo_users: env::var("SEED_DEMO_USERS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("SEED_DEMO_USERS must be true or false")?,
            demo_user_count: env::var("DEMO_USER_COUNT")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("DEMO_USER_COUNT must be a non-negative integer")?,

            price_refresh_secs: env::var("PRICE_REFRESH_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .context("PRICE_REFRESH_SECS must be a number of seconds")?,
            market_seed: env::var("MARKET_SEED")
                .ok()
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("MARKET_SEED must be an unsigned integer")?,

            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .context("SESSION_TTL_SECS must be a number of seconds")?,
            max_sessions: env::var("MAX_SESSIONS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("MAX_SESSIONS must be a positive integer")?,
            auth_max_failures: env::var("AUTH_MAX_FAILURES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("AUTH_MAX_FAILURES must be a positive integer")?,
            auth_failure_window_secs: env::var("AUTH_FAILURE_WINDOW_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("AUTH_FAILURE_WINDOW_SECS must be a number of seconds")?,
            auth_lockout_secs: env::var("AUTH_LOCKOUT_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("AUTH_LOCKOUT_SECS must be a number of seconds")?,
        };

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
