//! Shared entry service wrapper used by the sync engine and clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::conflict::Resolution;
use crate::db::{
    Database, EntryRepository, EventLog, FailureKind, SqliteEntryRepository, SqliteEventLog,
    SqliteSyncQueue, SyncQueue, SyncedOutcome,
};
use crate::error::{Error, Result};
use crate::models::{
    ConflictInfo, EntryId, EntryPatch, EventLogEntry, EventType, FieldEntry, NewFieldEntry,
    ResolutionStrategy, SyncQueueItem, SyncStatus,
};
use crate::util::now_millis;

/// Entity type recorded for pass-level events.
pub const SYNC_PASS_ENTITY: &str = "sync_pass";

/// Thread-safe service for store and repository operations.
///
/// The connection lock is held for one repository call at a time, so
/// foreground writes interleave with a running sync pass between network calls.
#[derive(Clone)]
pub struct EntryService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl EntryService {
    /// Open the store at the given filesystem path, creating parent directories.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::info!("Opened field store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open_in_memory()?)),
            db_path: None,
        })
    }

    /// Path of the backing file, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Capture a new entry.
    pub async fn create_entry(&self, new: NewFieldEntry) -> Result<FieldEntry> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).create(new)
    }

    /// Fetch an entry by id.
    pub async fn get_entry(&self, id: &EntryId) -> Result<Option<FieldEntry>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).get(id)
    }

    /// List live entries, most recently updated first.
    pub async fn list_entries(
        &self,
        status: Option<SyncStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FieldEntry>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).list(status, limit, offset)
    }

    /// Entries waiting on a sync pass.
    pub async fn list_pending_entries(&self) -> Result<Vec<FieldEntry>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).list_pending()
    }

    /// Resolve a full id or unique prefix.
    pub async fn resolve_entry_id(&self, raw: &str) -> Result<EntryId> {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<EntryId>() {
            return Ok(id);
        }

        let db = self.db.lock().await;
        let matches = SqliteEntryRepository::new(db.connection()).list_ids_by_prefix(raw)?;
        match matches.as_slice() {
            [] => Err(Error::NotFound(raw.to_string())),
            [id] => Ok(*id),
            _ => Err(Error::InvalidInput(format!(
                "id prefix '{raw}' matches {} entries",
                matches.len()
            ))),
        }
    }

    /// Edit an entry.
    pub async fn update_entry(&self, id: &EntryId, patch: &EntryPatch) -> Result<FieldEntry> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).update(id, patch)
    }

    /// Soft-delete an entry.
    pub async fn delete_entry(&self, id: &EntryId) -> Result<FieldEntry> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).delete(id)
    }

    /// Queue in drain order.
    pub async fn queue_items(&self) -> Result<Vec<SyncQueueItem>> {
        let db = self.db.lock().await;
        SqliteSyncQueue::new(db.connection()).list_ordered()
    }

    /// Queued change for one entry.
    pub async fn queue_item(&self, id: &EntryId) -> Result<Option<SyncQueueItem>> {
        let db = self.db.lock().await;
        SqliteSyncQueue::new(db.connection()).get_by_entity(&id.as_str())
    }

    /// Event history for one entity, oldest first.
    pub async fn events_for(&self, entity_id: &str) -> Result<Vec<EventLogEntry>> {
        let db = self.db.lock().await;
        SqliteEventLog::new(db.connection()).list_for_entity(entity_id)
    }

    /// Most recent events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<EventLogEntry>> {
        let db = self.db.lock().await;
        SqliteEventLog::new(db.connection()).list_recent(limit)
    }

    /// Entire event log, oldest first.
    pub async fn all_events(&self) -> Result<Vec<EventLogEntry>> {
        let db = self.db.lock().await;
        SqliteEventLog::new(db.connection()).list_all()
    }

    /// Unresolved conflicts.
    pub async fn list_conflicts(&self) -> Result<Vec<ConflictInfo>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).list_conflicts()
    }

    /// Conflict detail for one entry.
    pub async fn conflict_info(&self, id: &EntryId) -> Result<Option<ConflictInfo>> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).conflict_info(id)
    }

    /// Settle a conflict with the chosen strategy.
    pub async fn resolve_conflict(
        &self,
        id: &EntryId,
        strategy: ResolutionStrategy,
        resolved_by: &str,
    ) -> Result<Resolution> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).resolve_conflict(id, strategy, resolved_by)
    }

    /// Make a capped or backing-off item eligible again.
    pub async fn reset_retries(&self, id: &EntryId) -> Result<()> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).reset_retries(id)
    }

    pub(crate) async fn recover_interrupted(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).recover_interrupted()
    }

    pub(crate) async fn mark_syncing(&self, id: &EntryId) -> Result<()> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).mark_syncing(id)
    }

    pub(crate) async fn mark_synced(
        &self,
        id: &EntryId,
        revision: i64,
        server_version: Option<i64>,
    ) -> Result<SyncedOutcome> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).mark_synced(id, revision, server_version)
    }

    pub(crate) async fn mark_failed(
        &self,
        id: &EntryId,
        reason: &str,
        kind: FailureKind,
    ) -> Result<()> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).mark_failed(id, reason, kind)
    }

    pub(crate) async fn mark_conflicted(&self, id: &EntryId, info: &ConflictInfo) -> Result<()> {
        let db = self.db.lock().await;
        SqliteEntryRepository::new(db.connection()).mark_conflicted(id, info)
    }

    /// Record that a pass stopped early because connectivity dropped.
    pub(crate) async fn log_interrupted(&self, remaining: &[String]) -> Result<()> {
        let db = self.db.lock().await;
        SqliteEventLog::new(db.connection()).append(
            EventType::SyncInterrupted,
            SYNC_PASS_ENTITY,
            None,
            &serde_json::json!({ "remaining": remaining }),
            now_millis(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn new_entry() -> NewFieldEntry {
        NewFieldEntry::new("W-200", NaiveDate::from_ymd_opt(2024, 8, 1).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_create_and_list_roundtrip() {
        let service = EntryService::open_in_memory().unwrap();

        let entry = service.create_entry(new_entry()).await.unwrap();
        let entries = service.list_entries(None, 10, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry.id);
        assert_eq!(service.queue_items().await.unwrap().len(), 1);
        assert_eq!(service.events_for(&entry.id.as_str()).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolves_unique_prefix() {
        let service = EntryService::open_in_memory().unwrap();
        let entry = service.create_entry(new_entry()).await.unwrap();
        let id = entry.id.as_str();

        assert_eq!(service.resolve_entry_id(&id).await.unwrap(), entry.id);
        assert_eq!(service.resolve_entry_id(&id[..13]).await.unwrap(), entry.id);
        assert!(matches!(
            service.resolve_entry_id("zzzz").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_and_persists() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("field.db");

        let id = {
            let service = EntryService::open_path(&path).unwrap();
            assert_eq!(service.db_path(), Some(path.as_path()));
            service.create_entry(new_entry()).await.unwrap().id
        };

        let reopened = EntryService::open_path(&path).unwrap();
        assert!(reopened.get_entry(&id).await.unwrap().is_some());
        assert!(reopened.queue_item(&id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupted_pass_is_logged() {
        let service = EntryService::open_in_memory().unwrap();
        service
            .log_interrupted(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        let events = service.recent_events(5).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::SyncInterrupted);
        assert_eq!(events[0].entity_type, SYNC_PASS_ENTITY);
    }
}
