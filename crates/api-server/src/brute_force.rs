use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::AppConfig;

struct FailureRecord {
    count: u32,
    first_failure: Instant,
    locked_until: Option<Instant>,
}

/// Per-client login failure tracker with temporary lockout.
///
/// After `max_failures` failed logins inside `window`, the client is refused
/// for `lockout` regardless of the credentials it sends.
pub struct LoginGuard {
    failures: DashMap<String, FailureRecord>,
    max_failures: u32,
    window: Duration,
    lockout: Duration,
}

impl LoginGuard {
    pub fn new(max_failures: u32, window: Duration, lockout: Duration) -> Self {
        Self {
            failures: DashMap::new(),
            max_failures: max_failures.max(1),
            window,
            lockout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        tracing::info!(
            "Login guard: max {} failures in {}s window, {}s lockout",
            config.auth_max_failures,
            config.auth_failure_window_secs,
            config.auth_lockout_secs
        );

        Self::new(
            config.auth_max_failures,
            Duration::from_secs(config.auth_failure_window_secs),
            Duration::from_secs(config.auth_lockout_secs),
        )
    }

    pub fn record_failure(&self, client: &str) {
        let now = Instant::now();
        let mut record = self
            .failures
            .entry(client.to_string())
            .or_insert(FailureRecord {
                count: 0,
                first_failure: now,
                locked_until: None,
            });

        if now.duration_since(record.first_failure) > self.window {
            record.count = 0;
            record.first_failure = now;
            record.locked_until = None;
        }

        record.count += 1;
        if record.count >= self.max_failures {
            record.locked_until = Some(now + self.lockout);
            tracing::warn!(
                "Login lockout for {} after {} failures",
                client,
                record.count
            );
        }
    }

    pub fn is_locked(&self, client: &str) -> bool {
        self.failures
            .get(client)
            .and_then(|record| record.locked_until)
            .is_some_and(|until| Instant::now() < until)
    }

    pub fn record_success(&self, client: &str) {
        self.failures.remove(client);
    }

    /// Forget records older than window + lockout.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let max_age = self.window + self.lockout;
        self.failures
            .retain(|_, record| now.duration_since(record.first_failure) < max_age);
    }
}
