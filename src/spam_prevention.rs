use std::collections::HashMap;
use std::sync::RwLock;

use crate::{credentials::normalize_email, error::AuthError, token::now_millis};

/// Per-username counter of failed password grants.
pub trait SpamPrevention: Send + Sync {
    fn is_locked_out(&self, username: &str) -> Result<bool, AuthError>;
    fn record_failure(&self, username: &str) -> Result<(), AuthError>;
    fn reset_counter(&self, username: &str) -> Result<(), AuthError>;
}

#[derive(Clone, Copy, Debug)]
struct Attempts {
    count: u32,
    first_failure_at: i64,
}

/// In-process lockout counter. A username is locked out once it reaches
/// `max_attempts` failures within `window_seconds` of the first one.
pub struct LoginAttempts {
    max_attempts: u32,
    window_millis: i64,
    attempts: RwLock<HashMap<String, Attempts>>,
}

impl LoginAttempts {
    pub fn new(max_attempts: u32, window_seconds: i64) -> Self {
        Self {
            max_attempts,
            window_millis: window_seconds.saturating_mul(1000),
            attempts: RwLock::new(HashMap::new()),
        }
    }

    fn within_window(&self, attempts: &Attempts, now: i64) -> bool {
        now - attempts.first_failure_at < self.window_millis
    }

    pub fn failure_count(&self, username: &str) -> Result<u32, AuthError> {
        let attempts = self
            .attempts
            .read()
            .map_err(|e| AuthError::Internal(format!("Lock error: {e}")))?;
        Ok(attempts
            .get(&normalize_email(username))
            .filter(|a| self.within_window(a, now_millis()))
            .map_or(0, |a| a.count))
    }
}

impl SpamPrevention for LoginAttempts {
    fn is_locked_out(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.failure_count(username)? >= self.max_attempts)
    }

    fn record_failure(&self, username: &str) -> Result<(), AuthError> {
        let now = now_millis();
        let mut attempts = self
            .attempts
            .write()
            .map_err(|e| AuthError::Internal(format!("Lock error: {e}")))?;

        let entry = attempts
            .entry(normalize_email(username))
            .or_insert(Attempts {
                count: 0,
                first_failure_at: now,
            });
        if !self.within_window(entry, now) {
            *entry = Attempts {
                count: 0,
                first_failure_at: now,
            };
        }
        entry.count = entry.count.saturating_add(1);

        Ok(())
    }

    fn reset_counter(&self, username: &str) -> Result<(), AuthError> {
        let mut attempts = self
            .attempts
            .write()
            .map_err(|e| AuthError::Internal(format!("Lock error: {e}")))?;
        attempts.remove(&normalize_email(username));
        Ok(())
    }
}
