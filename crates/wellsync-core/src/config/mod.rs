//! Sync configuration.
//!
//! `SyncSettings` is what a client hands to the sync engine: where the
//! system of record lives, how long a single submission may take, and how
//! failed items back off. Tenant secrets are never part of this struct.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::normalize_base_url;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_INITIAL_DELAY_MS: u64 = 5_000;
const DEFAULT_MAX_DELAY_MS: u64 = 900_000;
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Settings for one device's sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    /// Base URL of the system of record, without a trailing slash
    pub api_base_url: String,
    /// Upper bound for one network call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl SyncSettings {
    /// Settings for a base URL with default timeout and retry policy.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim().trim_end_matches('/').to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        normalize_base_url(&self.api_base_url)?;
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be greater than 0".into()));
        }
        self.retry.validate()
    }
}

/// Exponential backoff with an attempt cap for failed queue items.
///
/// After `n` failed attempts an item becomes eligible again at
/// `last_attempted_at + min(initial * multiplier^(n-1), max_delay)`.
/// Once `n` reaches `max_attempts` it is held back until a person resets it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// `None` disables the cap
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl RetryPolicy {
    /// No waiting between passes and no cap.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            max_attempts: None,
        }
    }

    /// Delay before the next attempt after `failures` failed attempts.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64);

        Duration::from_millis(capped as u64)
    }

    /// Whether an item with `failures` failed attempts is held back for a human.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }

    /// Whether an item may be attempted at `now` (Unix ms).
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn is_ready(&self, failures: u32, last_attempted_at: Option<i64>, now: i64) -> bool {
        let Some(last) = last_attempted_at else {
            return true;
        };
        let delay = self.delay_for_attempt(failures).as_millis() as i64;
        now >= last.saturating_add(delay)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::Config(
                "retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::Config(
                "retry.max_delay_ms must not be below retry.initial_delay_ms".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
