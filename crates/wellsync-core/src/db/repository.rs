//! Field entry repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;

use crate::conflict::{self, Resolution};
use crate::error::{Error, Result};
use crate::models::{
    ConflictInfo, EntryId, EntryPatch, EquipmentReadings, EventType, FieldEntry, NewFieldEntry,
    ProductionVolumes, ResolutionStrategy, SyncAction, SyncStatus, FIELD_ENTRY_ENTITY,
};
use crate::util::now_millis;

use super::event_log::{EventLog, SqliteEventLog};
use super::queue::{SqliteSyncQueue, SyncQueue};
use super::{json_column, optional_json_column, parsed_column};

const ENTRY_COLUMNS: &str = "id, well_id, entry_date, oil_volume, gas_volume, water_volume,
     pressure, temperature, notes, photos, checklist, location, sync_status,
     created_at, updated_at, server_version, is_deleted";

/// How a failed submission is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network, timeout or server-side error; retried on a later pass
    Transient,
    /// Rejected by the server; still queued but flagged for a human
    Permanent,
}

/// Result of confirming a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncedOutcome {
    /// The submitted payload is still current; the entry is synced
    Synced,
    /// A local edit replaced the payload while it was in flight; the entry stays queued
    Superseded,
}

/// Trait for field entry storage operations.
///
/// This is the only writer of entry rows. Every mutation writes the entry,
/// its queue item and an event in one transaction, keeping sync status and
/// queue membership in agreement.
pub trait EntryRepository {
    /// Create a new pending entry and queue its CREATE
    fn create(&self, new: NewFieldEntry) -> Result<FieldEntry>;

    /// Get an entry by ID, including soft-deleted ones
    fn get(&self, id: &EntryId) -> Result<Option<FieldEntry>>;

    /// List live entries, most recently updated first
    fn list(
        &self,
        status: Option<SyncStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FieldEntry>>;

    /// Entries waiting on a sync pass (pending or failed), oldest first
    fn list_pending(&self) -> Result<Vec<FieldEntry>>;

    /// IDs starting with `prefix`, for short-id lookups
    fn list_ids_by_prefix(&self, prefix: &str) -> Result<Vec<EntryId>>;

    /// Apply a patch and replace the queued payload
    fn update(&self, id: &EntryId, patch: &EntryPatch) -> Result<FieldEntry>;

    /// Soft delete and queue the DELETE
    fn delete(&self, id: &EntryId) -> Result<FieldEntry>;

    /// Flag an entry as in flight
    fn mark_syncing(&self, id: &EntryId) -> Result<()>;

    /// Confirm a submission of queue revision `revision`
    fn mark_synced(
        &self,
        id: &EntryId,
        revision: i64,
        server_version: Option<i64>,
    ) -> Result<SyncedOutcome>;

    /// Record a failed submission; the queue item stays in place
    fn mark_failed(&self, id: &EntryId, reason: &str, kind: FailureKind) -> Result<()>;

    /// Park an entry behind a conflict until a strategy is chosen
    fn mark_conflicted(&self, id: &EntryId, info: &ConflictInfo) -> Result<()>;

    /// Local and server versions of a conflicted entry
    fn conflict_info(&self, id: &EntryId) -> Result<Option<ConflictInfo>>;

    /// All unresolved conflicts, oldest first
    fn list_conflicts(&self) -> Result<Vec<ConflictInfo>>;

    /// Settle a conflict with one strategy
    fn resolve_conflict(
        &self,
        id: &EntryId,
        strategy: ResolutionStrategy,
        resolved_by: &str,
    ) -> Result<Resolution>;

    /// Clear retry bookkeeping so a capped item is drained again
    fn reset_retries(&self, id: &EntryId) -> Result<()>;

    /// Return entries left in flight by an interrupted pass to pending
    fn recover_interrupted(&self) -> Result<usize>;
}

/// `SQLite` implementation of `EntryRepository`
pub struct SqliteEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<FieldEntry> {
        Ok(FieldEntry {
            id: parsed_column(row, 0)?,
            well_id: row.get(1)?,
            entry_date: parsed_column(row, 2)?,
            production: ProductionVolumes {
                oil: row.get(3)?,
                gas: row.get(4)?,
                water: row.get(5)?,
            },
            readings: EquipmentReadings {
                pressure: row.get(6)?,
                temperature: row.get(7)?,
            },
            notes: row.get(8)?,
            photos: json_column(row, 9)?,
            checklist: optional_json_column(row, 10)?,
            location: optional_json_column(row, 11)?,
            sync_status: parsed_column(row, 12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
            server_version: row.get(15)?,
            is_deleted: row.get::<_, i32>(16)? != 0,
        })
    }

    fn fetch(conn: &Connection, id: &EntryId) -> Result<Option<FieldEntry>> {
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM field_entries WHERE id = ?1"),
                params![id.as_str()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn require(conn: &Connection, id: &EntryId) -> Result<FieldEntry> {
        Self::fetch(conn, id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Fetch a live (not soft-deleted) entry or fail with `NotFound`.
    fn require_live(conn: &Connection, id: &EntryId) -> Result<FieldEntry> {
        match Self::fetch(conn, id)? {
            Some(entry) if !entry.is_deleted => Ok(entry),
            _ => Err(Error::NotFound(id.to_string())),
        }
    }

    fn insert_entry(conn: &Connection, entry: &FieldEntry) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO field_entries ({ENTRY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                entry.id.as_str(),
                entry.well_id,
                entry.entry_date.to_string(),
                entry.production.oil,
                entry.production.gas,
                entry.production.water,
                entry.readings.pressure,
                entry.readings.temperature,
                entry.notes,
                serde_json::to_string(&entry.photos)?,
                entry.checklist.as_ref().map(serde_json::to_string).transpose()?,
                entry.location.as_ref().map(serde_json::to_string).transpose()?,
                entry.sync_status.as_str(),
                entry.created_at,
                entry.updated_at,
                entry.server_version,
                i32::from(entry.is_deleted)
            ],
        )?;
        Ok(())
    }

    /// Overwrite an existing row with `entry`.
    fn write_entry(conn: &Connection, entry: &FieldEntry) -> Result<()> {
        let rows = conn.execute(
            "UPDATE field_entries
             SET well_id = ?1, entry_date = ?2, oil_volume = ?3, gas_volume = ?4,
                 water_volume = ?5, pressure = ?6, temperature = ?7, notes = ?8,
                 photos = ?9, checklist = ?10, location = ?11, sync_status = ?12,
                 updated_at = ?13, server_version = ?14, is_deleted = ?15
             WHERE id = ?16",
            params![
                entry.well_id,
                entry.entry_date.to_string(),
                entry.production.oil,
                entry.production.gas,
                entry.production.water,
                entry.readings.pressure,
                entry.readings.temperature,
                entry.notes,
                serde_json::to_string(&entry.photos)?,
                entry.checklist.as_ref().map(serde_json::to_string).transpose()?,
                entry.location.as_ref().map(serde_json::to_string).transpose()?,
                entry.sync_status.as_str(),
                entry.updated_at,
                entry.server_version,
                i32::from(entry.is_deleted),
                entry.id.as_str()
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(entry.id.to_string()));
        }
        Ok(())
    }

    fn set_status(conn: &Connection, id: &EntryId, status: SyncStatus) -> Result<()> {
        let rows = conn.execute(
            "UPDATE field_entries SET sync_status = ?1 WHERE id = ?2",
            params![status.as_str(), id.as_str()],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn load_server_version(conn: &Connection, id: &EntryId) -> Result<Option<FieldEntry>> {
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT conflict_server_version FROM field_entries WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        raw.flatten()
            .map(|raw| serde_json::from_str(&raw).map_err(Error::from))
            .transpose()
    }

    /// Shared path for user edits and deletes: bump `updated_at`, requeue, log.
    fn record_local_change(
        &self,
        id: &EntryId,
        action: SyncAction,
        event: EventType,
        change: impl FnOnce(&mut FieldEntry),
    ) -> Result<FieldEntry> {
        let tx = self.conn.unchecked_transaction()?;
        let mut entry = Self::require_live(&tx, id)?;

        change(&mut entry);
        entry.validate()?;

        // Keep updated_at strictly increasing even if the clock stalls.
        entry.updated_at = now_millis().max(entry.updated_at + 1);
        if matches!(entry.sync_status, SyncStatus::Synced | SyncStatus::Failed) {
            entry.sync_status = SyncStatus::Pending;
        }
        Self::write_entry(&tx, &entry)?;

        let snapshot = entry.snapshot()?;
        let now = entry.updated_at;
        let item = SqliteSyncQueue::new(&tx).upsert(
            action,
            FIELD_ENTRY_ENTITY,
            &id.as_str(),
            &snapshot,
            now,
        )?;
        SqliteEventLog::new(&tx).append(
            event,
            FIELD_ENTRY_ENTITY,
            Some(&id.as_str()),
            &json!({ "entry": snapshot, "action": item.action, "revision": item.revision }),
            now,
        )?;

        tx.commit()?;
        Ok(entry)
    }

    fn query_entries(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<FieldEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(args, Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn create(&self, new: NewFieldEntry) -> Result<FieldEntry> {
        let entry = new.into_entry(now_millis());
        entry.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        if Self::fetch(&tx, &entry.id)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "entry {} already exists",
                entry.id
            )));
        }
        Self::insert_entry(&tx, &entry)?;

        let snapshot = entry.snapshot()?;
        let id = entry.id.as_str();
        SqliteSyncQueue::new(&tx).upsert(
            SyncAction::Create,
            FIELD_ENTRY_ENTITY,
            &id,
            &snapshot,
            entry.created_at,
        )?;
        SqliteEventLog::new(&tx).append(
            EventType::EntryCreated,
            FIELD_ENTRY_ENTITY,
            Some(&id),
            &json!({ "entry": snapshot }),
            entry.created_at,
        )?;

        tx.commit()?;
        tracing::debug!("Created entry {id} for well {}", entry.well_id);
        Ok(entry)
    }

    fn get(&self, id: &EntryId) -> Result<Option<FieldEntry>> {
        Self::fetch(self.conn, id)
    }

    fn list(
        &self,
        status: Option<SyncStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FieldEntry>> {
        let base = format!(
            "SELECT {ENTRY_COLUMNS} FROM field_entries WHERE is_deleted = 0"
        );
        match status {
            Some(status) => self.query_entries(
                &format!("{base} AND sync_status = ?1 ORDER BY updated_at DESC LIMIT ?2 OFFSET ?3"),
                params![status.as_str(), limit as i64, offset as i64],
            ),
            None => self.query_entries(
                &format!("{base} ORDER BY updated_at DESC LIMIT ?1 OFFSET ?2"),
                params![limit as i64, offset as i64],
            ),
        }
    }

    fn list_pending(&self) -> Result<Vec<FieldEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM field_entries
                 WHERE sync_status IN ('pending', 'failed')
                 ORDER BY created_at ASC, id ASC"
            ),
            [],
        )
    }

    fn list_ids_by_prefix(&self, prefix: &str) -> Result<Vec<EntryId>> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("{}%", prefix.replace('%', "").replace('_', ""));

        let mut stmt = self
            .conn
            .prepare("SELECT id FROM field_entries WHERE id LIKE ?1 ORDER BY id ASC")?;
        let ids = stmt
            .query_map(params![pattern], |row| parsed_column(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn update(&self, id: &EntryId, patch: &EntryPatch) -> Result<FieldEntry> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".into()));
        }
        self.record_local_change(id, SyncAction::Update, EventType::EntryUpdated, |entry| {
            patch.apply(entry);
        })
    }

    fn delete(&self, id: &EntryId) -> Result<FieldEntry> {
        self.record_local_change(id, SyncAction::Delete, EventType::EntryDeleted, |entry| {
            entry.is_deleted = true;
        })
    }

    fn mark_syncing(&self, id: &EntryId) -> Result<()> {
        Self::set_status(self.conn, id, SyncStatus::Syncing)
    }

    fn mark_synced(
        &self,
        id: &EntryId,
        revision: i64,
        server_version: Option<i64>,
    ) -> Result<SyncedOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let queue = SqliteSyncQueue::new(&tx);
        let key = id.as_str();
        let now = now_millis();

        let current = queue.get_by_entity(&key)?;
        let outcome = match current {
            Some(item) if item.revision == revision => {
                queue.remove(&key)?;
                tx.execute(
                    "UPDATE field_entries
                     SET sync_status = 'synced',
                         server_version = COALESCE(?1, server_version)
                     WHERE id = ?2",
                    params![server_version, key],
                )?;
                SyncedOutcome::Synced
            }
            Some(_) => {
                // The server accepted the older revision. Keep its version so the
                // newer edit is not mistaken for someone else's change.
                let entry = Self::require(&tx, id)?;
                if entry.sync_status == SyncStatus::Syncing {
                    Self::set_status(&tx, id, SyncStatus::Pending)?;
                }
                tx.execute(
                    "UPDATE field_entries
                     SET server_version = COALESCE(?1, server_version)
                     WHERE id = ?2",
                    params![server_version, key],
                )?;
                queue.rebase(&key, server_version)?;
                SyncedOutcome::Superseded
            }
            None => {
                return Err(Error::InvalidState(format!(
                    "entry {id} has no queued change to confirm"
                )))
            }
        };

        SqliteEventLog::new(&tx).append(
            EventType::SyncSucceeded,
            FIELD_ENTRY_ENTITY,
            Some(&key),
            &json!({
                "revision": revision,
                "serverVersion": server_version,
                "superseded": outcome == SyncedOutcome::Superseded,
            }),
            now,
        )?;

        tx.commit()?;
        Ok(outcome)
    }

    fn mark_failed(&self, id: &EntryId, reason: &str, kind: FailureKind) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let key = id.as_str();
        let now = now_millis();

        Self::set_status(&tx, id, SyncStatus::Failed)?;
        let queue = SqliteSyncQueue::new(&tx);
        if !queue.record_failure(&key, reason, now)? {
            return Err(Error::InvalidState(format!(
                "entry {id} has no queued change to fail"
            )));
        }
        let retry_count = queue
            .get_by_entity(&key)?
            .map_or(0, |item| item.retry_count);

        let event = match kind {
            FailureKind::Transient => EventType::SyncTransientFailure,
            FailureKind::Permanent => EventType::SyncPermanentFailure,
        };
        SqliteEventLog::new(&tx).append(
            event,
            FIELD_ENTRY_ENTITY,
            Some(&key),
            &json!({ "reason": reason, "retryCount": retry_count }),
            now,
        )?;

        tx.commit()?;
        Ok(())
    }

    fn mark_conflicted(&self, id: &EntryId, info: &ConflictInfo) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let key = id.as_str();
        let now = now_millis();

        let rows = tx.execute(
            "UPDATE field_entries
             SET sync_status = 'conflicted', conflict_server_version = ?1
             WHERE id = ?2",
            params![serde_json::to_string(&info.server_version)?, key],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        if !SqliteSyncQueue::new(&tx).hold(&key)? {
            return Err(Error::InvalidState(format!(
                "entry {id} has no queued change to hold"
            )));
        }

        SqliteEventLog::new(&tx).append(
            EventType::SyncConflict,
            FIELD_ENTRY_ENTITY,
            Some(&key),
            &json!({
                "conflictFields": info.conflict_fields,
                "localVersion": info.local_version,
                "serverVersion": info.server_version,
            }),
            now,
        )?;

        tx.commit()?;
        Ok(())
    }

    fn conflict_info(&self, id: &EntryId) -> Result<Option<ConflictInfo>> {
        let Some(local) = Self::fetch(self.conn, id)? else {
            return Ok(None);
        };
        if local.sync_status != SyncStatus::Conflicted {
            return Ok(None);
        }
        let server = Self::load_server_version(self.conn, id)?.ok_or_else(|| {
            Error::InvalidState(format!("conflicted entry {id} has no server version"))
        })?;
        Ok(Some(ConflictInfo::new(local, server)))
    }

    fn list_conflicts(&self) -> Result<Vec<ConflictInfo>> {
        let conflicted = self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM field_entries
                 WHERE sync_status = 'conflicted'
                 ORDER BY updated_at ASC, id ASC"
            ),
            [],
        )?;

        conflicted
            .into_iter()
            .map(|local| {
                let server = Self::load_server_version(self.conn, &local.id)?.ok_or_else(|| {
                    Error::InvalidState(format!(
                        "conflicted entry {} has no server version",
                        local.id
                    ))
                })?;
                Ok(ConflictInfo::new(local, server))
            })
            .collect()
    }

    fn resolve_conflict(
        &self,
        id: &EntryId,
        strategy: ResolutionStrategy,
        resolved_by: &str,
    ) -> Result<Resolution> {
        let tx = self.conn.unchecked_transaction()?;
        let local = Self::require(&tx, id)?;
        if local.sync_status != SyncStatus::Conflicted {
            return Err(Error::InvalidState(format!(
                "entry {id} is {}, not conflicted",
                local.sync_status
            )));
        }
        let server = Self::load_server_version(&tx, id)?.ok_or_else(|| {
            Error::InvalidState(format!("conflicted entry {id} has no server version"))
        })?;
        let known_server_version = server.server_version;

        let info = ConflictInfo::new(local.clone(), server);
        let mut resolution = conflict::resolve(&info, strategy);
        let now = now_millis();

        let entry = &mut resolution.entry;
        entry.id = local.id;
        entry.created_at = local.created_at;
        entry.updated_at = now.max(local.updated_at + 1);
        entry.server_version = known_server_version.or(local.server_version);
        entry.sync_status = if resolution.resubmit {
            SyncStatus::Pending
        } else {
            SyncStatus::Synced
        };
        entry.validate()?;
        Self::write_entry(&tx, entry)?;
        tx.execute(
            "UPDATE field_entries SET conflict_server_version = NULL WHERE id = ?1",
            params![id.as_str()],
        )?;

        let key = id.as_str();
        let queue = SqliteSyncQueue::new(&tx);
        queue.remove(&key)?;
        if resolution.resubmit {
            let action = if entry.is_deleted {
                SyncAction::Delete
            } else {
                SyncAction::Update
            };
            queue.requeue(action, FIELD_ENTRY_ENTITY, &key, &entry.snapshot()?, now)?;
        }

        SqliteEventLog::new(&tx).append(
            EventType::ConflictResolved,
            FIELD_ENTRY_ENTITY,
            Some(&key),
            &json!({
                "strategy": strategy,
                "resolvedBy": resolved_by,
                "conflictFields": info.conflict_fields,
                "safetyDecisions": resolution.safety_decisions,
                "resubmit": resolution.resubmit,
                "entry": entry.snapshot()?,
            }),
            now,
        )?;

        tx.commit()?;
        tracing::info!("Resolved conflict on entry {id} with strategy {strategy} ({resolved_by})");
        Ok(resolution)
    }

    fn reset_retries(&self, id: &EntryId) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let key = id.as_str();

        if !SqliteSyncQueue::new(&tx).reset_retries(&key)? {
            return Err(Error::NotFound(format!("no queued change for entry {id}")));
        }
        SqliteEventLog::new(&tx).append(
            EventType::RetryReset,
            FIELD_ENTRY_ENTITY,
            Some(&key),
            &json!({}),
            now_millis(),
        )?;

        tx.commit()?;
        Ok(())
    }

    fn recover_interrupted(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let ids: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM field_entries WHERE sync_status = 'syncing' ORDER BY id ASC",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            ids
        };
        if ids.is_empty() {
            return Ok(0);
        }

        let now = now_millis();
        let log = SqliteEventLog::new(&tx);
        for id in &ids {
            tx.execute(
                "UPDATE field_entries SET sync_status = 'pending' WHERE id = ?1",
                params![id],
            )?;
            log.append(
                EventType::SyncInterrupted,
                FIELD_ENTRY_ENTITY,
                Some(id.as_str()),
                &json!({ "recovered": true, "outcome": "unknown" }),
                now,
            )?;
        }

        tx.commit()?;
        tracing::warn!("Returned {} interrupted submission(s) to pending", ids.len());
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ScalarField;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_entry(well: &str) -> NewFieldEntry {
        let mut new = NewFieldEntry::new(well, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        new.production.oil = 120.0;
        new.production.water = 30.0;
        new.readings.pressure = Some(1200.0);
        new.readings.temperature = Some(180.0);
        new
    }

    /// Every non-synced entry has exactly one queue item; synced ones have none.
    fn assert_queue_invariant(db: &Database) {
        let conn = db.connection();
        let repo = SqliteEntryRepository::new(conn);
        let queue = SqliteSyncQueue::new(conn);
        let ids: Vec<String> = conn
            .prepare("SELECT id FROM field_entries")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        for id in ids {
            let entry = repo.get(&id.parse().unwrap()).unwrap().unwrap();
            let queued = queue.get_by_entity(&id).unwrap().is_some();
            assert_eq!(
                queued,
                entry.sync_status.requires_queue_item(),
                "entry {id} is {}",
                entry.sync_status
            );
        }
    }

    fn conflict_for(entry: &FieldEntry, pressure: f64) -> ConflictInfo {
        let mut server = entry.clone();
        server.readings.pressure = Some(pressure);
        server.server_version = Some(7);
        ConflictInfo::new(entry.clone(), server)
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());

        let entry = repo.create(new_entry("W-101")).unwrap();
        assert_eq!(entry.sync_status, SyncStatus::Pending);

        let fetched = repo.get(&entry.id).unwrap().unwrap();
        assert_eq!(fetched, entry);

        let item = SqliteSyncQueue::new(db.connection())
            .get_by_entity(&entry.id.as_str())
            .unwrap()
            .unwrap();
        assert_eq!(item.action, SyncAction::Create);
        assert_eq!(FieldEntry::from_snapshot(item.payload).unwrap(), entry);

        let events = SqliteEventLog::new(db.connection())
            .list_for_entity(&entry.id.as_str())
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::EntryCreated);
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_create_rejects_invalid_entry() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());

        let mut new = new_entry("W-1");
        new.production.gas = -4.0;
        assert!(matches!(repo.create(new), Err(Error::InvalidInput(_))));
        assert_eq!(SqliteSyncQueue::new(db.connection()).count().unwrap(), 0);
    }

    #[test]
    fn test_create_rejects_duplicate_id() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());

        let entry = repo.create(new_entry("W-1")).unwrap();
        let mut again = new_entry("W-1");
        again.id = Some(entry.id);
        assert!(repo.create(again).is_err());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let patch = EntryPatch {
            notes: Some("x".into()),
            ..EntryPatch::default()
        };
        assert!(matches!(
            repo.update(&EntryId::new(), &patch),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_edits_replace_queued_payload() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-2")).unwrap();

        for pressure in [1210.0, 1220.0] {
            let patch = EntryPatch {
                pressure: Some(Some(pressure)),
                ..EntryPatch::default()
            };
            repo.update(&entry.id, &patch).unwrap();
        }

        let queue = SqliteSyncQueue::new(db.connection());
        assert_eq!(queue.count().unwrap(), 1);
        let item = queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap();
        assert_eq!(item.action, SyncAction::Create);
        assert_eq!(item.revision, 3);
        assert_eq!(item.payload["readings"]["pressure"], 1220.0);
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_update_bumps_updated_at() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-2")).unwrap();

        let patch = EntryPatch {
            notes: Some("rod pump squeaking".into()),
            ..EntryPatch::default()
        };
        let updated = repo.update(&entry.id, &patch).unwrap();
        assert!(updated.updated_at > entry.updated_at);
        assert_eq!(updated.created_at, entry.created_at);
    }

    #[test]
    fn test_edit_after_sync_requeues_update() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let queue = SqliteSyncQueue::new(db.connection());
        let entry = repo.create(new_entry("W-3")).unwrap();

        let revision = queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap().revision;
        repo.mark_syncing(&entry.id).unwrap();
        assert_eq!(
            repo.mark_synced(&entry.id, revision, Some(1)).unwrap(),
            SyncedOutcome::Synced
        );
        assert_queue_invariant(&db);

        let synced = repo.get(&entry.id).unwrap().unwrap();
        assert_eq!(synced.sync_status, SyncStatus::Synced);
        assert_eq!(synced.server_version, Some(1));

        let patch = EntryPatch {
            oil: Some(99.0),
            ..EntryPatch::default()
        };
        let edited = repo.update(&entry.id, &patch).unwrap();
        assert_eq!(edited.sync_status, SyncStatus::Pending);
        let item = queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap();
        assert_eq!(item.action, SyncAction::Update);
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_edit_during_flight_supersedes_confirmation() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let queue = SqliteSyncQueue::new(db.connection());
        let entry = repo.create(new_entry("W-4")).unwrap();

        let submitted = queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap();
        repo.mark_syncing(&entry.id).unwrap();

        let patch = EntryPatch {
            water: Some(44.0),
            ..EntryPatch::default()
        };
        repo.update(&entry.id, &patch).unwrap();

        let outcome = repo
            .mark_synced(&entry.id, submitted.revision, Some(3))
            .unwrap();
        assert_eq!(outcome, SyncedOutcome::Superseded);

        let entry = repo.get(&entry.id).unwrap().unwrap();
        assert_eq!(entry.sync_status, SyncStatus::Pending);
        assert_eq!(entry.server_version, Some(3));
        let item = queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap();
        assert_eq!(item.payload["production"]["water"], 44.0);
        assert_eq!(item.payload["serverVersion"], 3);
        assert_eq!(item.action, SyncAction::Update);
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_delete_is_queued_soft_delete() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-5")).unwrap();

        let deleted = repo.delete(&entry.id).unwrap();
        assert!(deleted.is_deleted);
        assert!(repo.list(None, 10, 0).unwrap().is_empty());
        assert!(repo.get(&entry.id).unwrap().unwrap().is_deleted);

        let item = SqliteSyncQueue::new(db.connection())
            .get_by_entity(&entry.id.as_str())
            .unwrap()
            .unwrap();
        assert_eq!(item.action, SyncAction::Delete);

        assert!(matches!(repo.delete(&entry.id), Err(Error::NotFound(_))));
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_mark_failed_keeps_item() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-6")).unwrap();

        repo.mark_syncing(&entry.id).unwrap();
        repo.mark_failed(&entry.id, "HTTP 503", FailureKind::Transient)
            .unwrap();

        let item = SqliteSyncQueue::new(db.connection())
            .get_by_entity(&entry.id.as_str())
            .unwrap()
            .unwrap();
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.last_error.as_deref(), Some("HTTP 503"));
        assert_eq!(
            repo.get(&entry.id).unwrap().unwrap().sync_status,
            SyncStatus::Failed
        );

        let events = SqliteEventLog::new(db.connection())
            .list_for_entity(&entry.id.as_str())
            .unwrap();
        assert_eq!(
            events.last().unwrap().event_type,
            EventType::SyncTransientFailure
        );
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_list_filters_by_status() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let a = repo.create(new_entry("W-7")).unwrap();
        repo.create(new_entry("W-8")).unwrap();

        repo.mark_failed(&a.id, "timeout", FailureKind::Transient)
            .unwrap();

        let failed = repo.list(Some(SyncStatus::Failed), 10, 0).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, a.id);
        assert_eq!(repo.list(None, 10, 0).unwrap().len(), 2);
        assert_eq!(repo.list_pending().unwrap().len(), 2);
    }

    #[test]
    fn test_list_ids_by_prefix() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-9")).unwrap();

        let id = entry.id.as_str();
        assert_eq!(repo.list_ids_by_prefix(&id[..8]).unwrap(), vec![entry.id]);
        assert!(repo.list_ids_by_prefix("").unwrap().is_empty());
    }

    #[test]
    fn test_conflict_roundtrip_server() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-10")).unwrap();

        let info = conflict_for(&entry, 1250.0);
        assert_eq!(
            info.conflict_fields,
            vec![crate::models::FieldPath::Scalar(ScalarField::Pressure)]
        );
        repo.mark_conflicted(&entry.id, &info).unwrap();
        assert_queue_invariant(&db);

        let stored = repo.conflict_info(&entry.id).unwrap().unwrap();
        assert_eq!(stored.field_paths(), vec!["pressure"]);
        assert_eq!(repo.list_conflicts().unwrap().len(), 1);

        repo.resolve_conflict(&entry.id, ResolutionStrategy::Server, "ops")
            .unwrap();
        let resolved = repo.get(&entry.id).unwrap().unwrap();
        assert_eq!(resolved.sync_status, SyncStatus::Synced);
        assert_eq!(resolved.readings.pressure, Some(1250.0));
        assert_eq!(resolved.server_version, Some(7));
        assert!(repo.conflict_info(&entry.id).unwrap().is_none());
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_conflict_roundtrip_local_requeues_update() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let queue = SqliteSyncQueue::new(db.connection());
        let entry = repo.create(new_entry("W-11")).unwrap();

        let held = queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap();
        repo.mark_conflicted(&entry.id, &conflict_for(&entry, 1250.0))
            .unwrap();
        assert!(queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap().held);

        let resolution = repo
            .resolve_conflict(&entry.id, ResolutionStrategy::Local, "ops")
            .unwrap();
        assert!(resolution.resubmit);

        let item = queue.get_by_entity(&entry.id.as_str()).unwrap().unwrap();
        assert_ne!(item.id, held.id);
        assert!(!item.held);
        assert_eq!(item.action, SyncAction::Update);
        assert_eq!(item.payload["readings"]["pressure"], 1200.0);
        assert_eq!(item.payload["serverVersion"], 7);
        assert_eq!(
            repo.get(&entry.id).unwrap().unwrap().sync_status,
            SyncStatus::Pending
        );

        let events = SqliteEventLog::new(db.connection())
            .list_for_entity(&entry.id.as_str())
            .unwrap();
        let resolved = events.last().unwrap();
        assert_eq!(resolved.event_type, EventType::ConflictResolved);
        assert_eq!(resolved.payload["strategy"], "local");
        assert_eq!(resolved.payload["resolvedBy"], "ops");
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_conflict_merge_takes_higher_pressure() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-12")).unwrap();

        repo.mark_conflicted(&entry.id, &conflict_for(&entry, 1250.0))
            .unwrap();
        let resolution = repo
            .resolve_conflict(&entry.id, ResolutionStrategy::Merge, "ops")
            .unwrap();

        assert_eq!(resolution.safety_decisions.len(), 1);
        let merged = repo.get(&entry.id).unwrap().unwrap();
        assert_eq!(merged.readings.pressure, Some(1250.0));
        assert_eq!(merged.sync_status, SyncStatus::Pending);
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_resolve_requires_conflict() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-13")).unwrap();

        assert!(matches!(
            repo.resolve_conflict(&entry.id, ResolutionStrategy::Local, "ops"),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_edit_while_conflicted_keeps_hold() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-14")).unwrap();
        repo.mark_conflicted(&entry.id, &conflict_for(&entry, 1250.0))
            .unwrap();

        let patch = EntryPatch {
            notes: Some("rechecked gauge".into()),
            ..EntryPatch::default()
        };
        let edited = repo.update(&entry.id, &patch).unwrap();
        assert_eq!(edited.sync_status, SyncStatus::Conflicted);
        let item = SqliteSyncQueue::new(db.connection())
            .get_by_entity(&entry.id.as_str())
            .unwrap()
            .unwrap();
        assert!(item.held);
        assert_eq!(item.payload["notes"], "rechecked gauge");
        assert_queue_invariant(&db);
    }

    #[test]
    fn test_reset_retries_logs_event() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-15")).unwrap();
        repo.mark_failed(&entry.id, "HTTP 422", FailureKind::Permanent)
            .unwrap();

        repo.reset_retries(&entry.id).unwrap();
        let item = SqliteSyncQueue::new(db.connection())
            .get_by_entity(&entry.id.as_str())
            .unwrap()
            .unwrap();
        assert_eq!(item.retry_count, 0);

        let events = SqliteEventLog::new(db.connection())
            .list_for_entity(&entry.id.as_str())
            .unwrap();
        assert_eq!(events.last().unwrap().event_type, EventType::RetryReset);
    }

    #[test]
    fn test_recover_interrupted() {
        let db = setup();
        let repo = SqliteEntryRepository::new(db.connection());
        let entry = repo.create(new_entry("W-16")).unwrap();
        repo.mark_syncing(&entry.id).unwrap();

        assert_eq!(repo.recover_interrupted().unwrap(), 1);
        assert_eq!(
            repo.get(&entry.id).unwrap().unwrap().sync_status,
            SyncStatus::Pending
        );
        assert_eq!(repo.recover_interrupted().unwrap(), 0);

        let events = SqliteEventLog::new(db.connection())
            .list_for_entity(&entry.id.as_str())
            .unwrap();
        let recovered = events
            .iter()
            .filter(|event| event.event_type == EventType::SyncInterrupted)
            .collect::<Vec<_>>();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].payload["outcome"], "unknown");
    }
}
