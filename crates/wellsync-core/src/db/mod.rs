//! Local store for Wellsync
//!
//! One `SQLite` database per device holds field entries, the pending-change
//! queue and the append-only event log. Every mutation of an entry runs in a
//! single transaction together with its queue item and event, so a crash can
//! never leave a saved entry without its queued intent.

mod connection;
mod event_log;
mod migrations;
mod queue;
mod repository;

pub use connection::Database;
pub use event_log::{EventLog, SqliteEventLog};
pub use queue::{SqliteSyncQueue, SyncQueue};
pub use repository::{EntryRepository, FailureKind, SqliteEntryRepository, SyncedOutcome};

use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// Decode a JSON text column.
fn json_column<T: DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

/// Decode a nullable JSON text column.
fn optional_json_column<T: DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
        })
    })
    .transpose()
}

/// Decode a text column through `FromStr`.
fn parsed_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}
