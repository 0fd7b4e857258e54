//! Append-only event log storage

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{EventLogEntry, EventType};

use super::{json_column, parsed_column};

const EVENT_COLUMNS: &str = "id, event_type, entity_type, entity_id, payload, created_at";

/// Trait for event log operations. There is no update or delete.
pub trait EventLog {
    /// Append an event
    fn append(
        &self,
        event_type: EventType,
        entity_type: &str,
        entity_id: Option<&str>,
        payload: &serde_json::Value,
        now: i64,
    ) -> Result<EventLogEntry>;

    /// Events for one entity, oldest first
    fn list_for_entity(&self, entity_id: &str) -> Result<Vec<EventLogEntry>>;

    /// Most recent events, newest first
    fn list_recent(&self, limit: usize) -> Result<Vec<EventLogEntry>>;

    /// Whole log, oldest first
    fn list_all(&self) -> Result<Vec<EventLogEntry>>;
}

/// `SQLite` implementation of `EventLog`
pub struct SqliteEventLog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEventLog<'a> {
    /// Create a new event log view over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventLogEntry> {
        Ok(EventLogEntry {
            id: row.get(0)?,
            event_type: parsed_column(row, 1)?,
            entity_type: row.get(2)?,
            entity_id: row.get(3)?,
            payload: json_column(row, 4)?,
            created_at: row.get(5)?,
        })
    }

    fn query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let events = stmt
            .query_map(args, Self::parse_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

impl EventLog for SqliteEventLog<'_> {
    fn append(
        &self,
        event_type: EventType,
        entity_type: &str,
        entity_id: Option<&str>,
        payload: &serde_json::Value,
        now: i64,
    ) -> Result<EventLogEntry> {
        self.conn.execute(
            "INSERT INTO event_log (event_type, entity_type, entity_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event_type.as_str(),
                entity_type,
                entity_id,
                serde_json::to_string(payload)?,
                now
            ],
        )?;

        Ok(EventLogEntry {
            id: self.conn.last_insert_rowid(),
            event_type,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(str::to_string),
            payload: payload.clone(),
            created_at: now,
        })
    }

    fn list_for_entity(&self, entity_id: &str) -> Result<Vec<EventLogEntry>> {
        self.query(
            &format!("SELECT {EVENT_COLUMNS} FROM event_log WHERE entity_id = ?1 ORDER BY id ASC"),
            params![entity_id],
        )
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<EventLogEntry>> {
        self.query(
            &format!("SELECT {EVENT_COLUMNS} FROM event_log ORDER BY id DESC LIMIT ?1"),
            params![limit as i64],
        )
    }

    fn list_all(&self) -> Result<Vec<EventLogEntry>> {
        self.query(
            &format!("SELECT {EVENT_COLUMNS} FROM event_log ORDER BY id ASC"),
            [],
        )
    }
}
