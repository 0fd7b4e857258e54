//! Sync queue item model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::RetryPolicy;
use crate::error::{Error, Result};

/// Mutation a queue item asks the server to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Action to store when a new mutation replaces a queued one.
    ///
    /// A CREATE the server has not seen yet stays a CREATE; a delete always wins.
    #[must_use]
    pub const fn fold(existing: Option<Self>, incoming: Self) -> Self {
        match (existing, incoming) {
            (_, Self::Delete) => Self::Delete,
            (Some(Self::Create), _) => Self::Create,
            (_, incoming) => incoming,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown sync action '{other}'"))),
        }
    }
}

/// A durable intent to mutate server state. At most one exists per entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    /// Queue row identifier
    pub id: i64,
    pub action: SyncAction,
    pub entity_type: String,
    pub entity_id: String,
    /// Entity snapshot taken when the mutation was recorded
    pub payload: serde_json::Value,
    /// Enqueue timestamp (Unix ms); drain order key
    pub created_at: i64,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Timestamp of the last failed attempt (Unix ms)
    pub last_attempted_at: Option<i64>,
    /// Bumped each time the payload is replaced
    pub revision: i64,
    /// Parked behind an unresolved conflict; not drained
    pub held: bool,
}

/// Whether a queue item may be drained in the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    /// Parked behind an unresolved conflict
    Held,
    /// Waiting out its backoff delay
    BackingOff,
    /// Hit the attempt cap; needs a manual retry reset
    Exhausted,
}

impl Readiness {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Held => "held",
            Self::BackingOff => "backing_off",
            Self::Exhausted => "exhausted",
        }
    }
}

impl SyncQueueItem {
    /// Classify this item against the retry policy at `now` (Unix ms).
    #[must_use]
    pub fn readiness(&self, policy: &RetryPolicy, now: i64) -> Readiness {
        if self.held {
            Readiness::Held
        } else if policy.is_exhausted(self.retry_count) {
            Readiness::Exhausted
        } else if !policy.is_ready(self.retry_count, self.last_attempted_at, now) {
            Readiness::BackingOff
        } else {
            Readiness::Ready
        }
    }
}
