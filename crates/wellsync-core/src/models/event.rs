//! Event log model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    EntryCreated,
    EntryUpdated,
    EntryDeleted,
    SyncSucceeded,
    SyncConflict,
    SyncTransientFailure,
    SyncPermanentFailure,
    SyncInterrupted,
    ConflictResolved,
    RetryReset,
}

impl EventType {
    pub const ALL: [Self; 10] = [
        Self::EntryCreated,
        Self::EntryUpdated,
        Self::EntryDeleted,
        Self::SyncSucceeded,
        Self::SyncConflict,
        Self::SyncTransientFailure,
        Self::SyncPermanentFailure,
        Self::SyncInterrupted,
        Self::ConflictResolved,
        Self::RetryReset,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntryCreated => "entry_created",
            Self::EntryUpdated => "entry_updated",
            Self::EntryDeleted => "entry_deleted",
            Self::SyncSucceeded => "sync_succeeded",
            Self::SyncConflict => "sync_conflict",
            Self::SyncTransientFailure => "sync_transient_failure",
            Self::SyncPermanentFailure => "sync_permanent_failure",
            Self::SyncInterrupted => "sync_interrupted",
            Self::ConflictResolved => "conflict_resolved",
            Self::RetryReset => "retry_reset",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown event type '{s}'")))
    }
}

/// Append-only audit record. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub id: i64,
    pub event_type: EventType,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload: serde_json::Value,
    /// Unix ms
    pub created_at: i64,
}
