//! Sync queue storage

use rusqlite::{params, Connection, OptionalExtension};

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::models::{Readiness, SyncAction, SyncQueueItem};

use super::{json_column, parsed_column};

const QUEUE_COLUMNS: &str = "id, action, entity_type, entity_id, payload, created_at,
     retry_count, last_error, last_attempted_at, revision, held";

/// Trait for pending-mutation queue operations.
///
/// The queue is keyed by entity: recording a mutation for an entity that is
/// already queued replaces that item's payload in place.
pub trait SyncQueue {
    /// Record a mutation, replacing the entity's queued payload if present
    fn upsert(
        &self,
        action: SyncAction,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        now: i64,
    ) -> Result<SyncQueueItem>;

    /// Drop any queued item for the entity and enqueue a fresh one at the back
    fn requeue(
        &self,
        action: SyncAction,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        now: i64,
    ) -> Result<SyncQueueItem>;

    /// Get the queued item for an entity
    fn get_by_entity(&self, entity_id: &str) -> Result<Option<SyncQueueItem>>;

    /// All items, oldest intent first
    fn list_ordered(&self) -> Result<Vec<SyncQueueItem>>;

    /// Items a pass may drain at `now`, oldest intent first
    fn list_ready(&self, now: i64, policy: &RetryPolicy) -> Result<Vec<SyncQueueItem>> {
        Ok(self
            .list_ordered()?
            .into_iter()
            .filter(|item| item.readiness(policy, now) == Readiness::Ready)
            .collect())
    }

    /// Bump retry bookkeeping after a failed attempt. The item keeps its position.
    fn record_failure(&self, entity_id: &str, error: &str, now: i64) -> Result<bool>;

    /// Point a still-queued item at the server version an earlier submission
    /// produced. A queued CREATE becomes an UPDATE since the server now holds
    /// the record. The revision is unchanged.
    fn rebase(&self, entity_id: &str, server_version: Option<i64>) -> Result<bool>;

    /// Park an item behind an unresolved conflict
    fn hold(&self, entity_id: &str) -> Result<bool>;

    /// Remove an entity's item
    fn remove(&self, entity_id: &str) -> Result<bool>;

    /// Clear retry bookkeeping so the item is drained again
    fn reset_retries(&self, entity_id: &str) -> Result<bool>;

    /// Number of queued items
    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `SyncQueue`
pub struct SqliteSyncQueue<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncQueue<'a> {
    /// Create a new queue view over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncQueueItem> {
        Ok(SyncQueueItem {
            id: row.get(0)?,
            action: parsed_column(row, 1)?,
            entity_type: row.get(2)?,
            entity_id: row.get(3)?,
            payload: json_column(row, 4)?,
            created_at: row.get(5)?,
            retry_count: row.get(6)?,
            last_error: row.get(7)?,
            last_attempted_at: row.get(8)?,
            revision: row.get(9)?,
            held: row.get::<_, i32>(10)? != 0,
        })
    }

    fn insert(
        &self,
        action: SyncAction,
        entity_type: &str,
        entity_id: &str,
        payload: &str,
        now: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_queue (action, entity_type, entity_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![action.as_str(), entity_type, entity_id, payload, now],
        )?;
        Ok(())
    }

    fn require(&self, entity_id: &str) -> Result<SyncQueueItem> {
        self.get_by_entity(entity_id)?.ok_or_else(|| {
            crate::Error::NotFound(format!("queue item for entity {entity_id}"))
        })
    }
}

impl SyncQueue for SqliteSyncQueue<'_> {
    fn upsert(
        &self,
        action: SyncAction,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        now: i64,
    ) -> Result<SyncQueueItem> {
        let payload = serde_json::to_string(payload)?;

        match self.get_by_entity(entity_id)? {
            Some(existing) => {
                let action = SyncAction::fold(Some(existing.action), action);
                // A new local intent starts its retry bookkeeping over.
                self.conn.execute(
                    "UPDATE sync_queue
                     SET action = ?1, payload = ?2, revision = revision + 1,
                         retry_count = 0, last_error = NULL, last_attempted_at = NULL
                     WHERE entity_id = ?3",
                    params![action.as_str(), payload, entity_id],
                )?;
            }
            None => self.insert(action, entity_type, entity_id, &payload, now)?,
        }

        self.require(entity_id)
    }

    fn requeue(
        &self,
        action: SyncAction,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        now: i64,
    ) -> Result<SyncQueueItem> {
        let payload = serde_json::to_string(payload)?;
        self.remove(entity_id)?;
        self.insert(action, entity_type, entity_id, &payload, now)?;
        self.require(entity_id)
    }

    fn get_by_entity(&self, entity_id: &str) -> Result<Option<SyncQueueItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE entity_id = ?1"),
                params![entity_id],
                Self::parse_item,
            )
            .optional()?;
        Ok(item)
    }

    fn list_ordered(&self) -> Result<Vec<SyncQueueItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue ORDER BY created_at ASC, id ASC"
        ))?;

        let items = stmt
            .query_map([], Self::parse_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(items)
    }

    fn record_failure(&self, entity_id: &str, error: &str, now: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE sync_queue
             SET retry_count = retry_count + 1, last_error = ?1, last_attempted_at = ?2
             WHERE entity_id = ?3",
            params![error, now, entity_id],
        )?;
        Ok(rows > 0)
    }

    fn rebase(&self, entity_id: &str, server_version: Option<i64>) -> Result<bool> {
        let Some(mut item) = self.get_by_entity(entity_id)? else {
            return Ok(false);
        };

        if let (Some(version), Some(fields)) = (server_version, item.payload.as_object_mut()) {
            fields.insert("serverVersion".to_string(), serde_json::Value::from(version));
        }
        let action = match item.action {
            SyncAction::Create => SyncAction::Update,
            other => other,
        };

        self.conn.execute(
            "UPDATE sync_queue SET action = ?1, payload = ?2 WHERE entity_id = ?3",
            params![
                action.as_str(),
                serde_json::to_string(&item.payload)?,
                entity_id
            ],
        )?;
        Ok(true)
    }

    fn hold(&self, entity_id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET held = 1 WHERE entity_id = ?1",
            params![entity_id],
        )?;
        Ok(rows > 0)
    }

    fn remove(&self, entity_id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE entity_id = ?1",
            params![entity_id],
        )?;
        Ok(rows > 0)
    }

    fn reset_retries(&self, entity_id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE sync_queue
             SET retry_count = 0, last_error = NULL, last_attempted_at = NULL
             WHERE entity_id = ?1",
            params![entity_id],
        )?;
        Ok(rows > 0)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
