//! End-to-end sync behaviour through the public API.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use wellsync_core::models::{
    EntryPatch, NewFieldEntry, ResolutionStrategy, SyncAction, SyncStatus,
};
use wellsync_core::sync::{
    PassState, RemoteEndpoint, StaticConnectivity, SubmitOutcome, Submission, SyncEngine,
    SyncError, SyncResult,
};
use wellsync_core::{EntryId, EntryService, FieldEntry, RetryPolicy, SyncSettings};

#[derive(Debug, Clone)]
struct Record {
    entry: FieldEntry,
    version: i64,
    last_payload: serde_json::Value,
}

/// System of record keyed by entity id, with optimistic version checks.
#[derive(Default)]
struct InMemoryServer {
    records: Mutex<HashMap<String, Record>>,
    received: Mutex<Vec<String>>,
    fail_once: Mutex<HashSet<String>>,
    edit_in_flight: Mutex<Option<(EntryService, EntryId, EntryPatch)>>,
}

impl InMemoryServer {
    fn record(&self, id: &EntryId) -> Option<Record> {
        self.records.lock().unwrap().get(&id.as_str()).cloned()
    }

    fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    fn fail_once(&self, id: &EntryId) {
        self.fail_once.lock().unwrap().insert(id.as_str());
    }

    /// The device edits `id` while the next submission is being handled.
    fn edit_during_next_submit(&self, service: EntryService, id: EntryId, patch: EntryPatch) {
        *self.edit_in_flight.lock().unwrap() = Some((service, id, patch));
    }

    /// Another actor edits the canonical record.
    fn edit_remotely(&self, id: &EntryId, edit: impl FnOnce(&mut FieldEntry)) {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id.as_str()).unwrap();
        edit(&mut record.entry);
        record.version += 1;
        record.entry.server_version = Some(record.version);
    }
}

impl RemoteEndpoint for InMemoryServer {
    async fn submit(&self, submission: &Submission) -> SyncResult<SubmitOutcome> {
        self.received
            .lock()
            .unwrap()
            .push(submission.entity_id.clone());
        if self.fail_once.lock().unwrap().remove(&submission.entity_id) {
            return Err(SyncError::Transient("connection reset".to_string()));
        }
        let edit = self.edit_in_flight.lock().unwrap().take();
        if let Some((service, id, patch)) = edit {
            service.update_entry(&id, &patch).await.unwrap();
        }

        let mut records = self.records.lock().unwrap();
        let existing = records.get(&submission.entity_id);

        if let Some(record) = existing {
            // Idempotent replay of the last accepted payload.
            if record.last_payload == submission.payload {
                return Ok(SubmitOutcome::Accepted {
                    server_version: Some(record.version),
                });
            }
            if submission.known_server_version != Some(record.version) {
                return Ok(SubmitOutcome::Conflict);
            }
        }

        if submission.action == SyncAction::Delete {
            records.remove(&submission.entity_id);
            return Ok(SubmitOutcome::Accepted {
                server_version: None,
            });
        }

        let mut entry = FieldEntry::from_snapshot(submission.payload.clone())
            .map_err(|error| SyncError::Protocol(error.to_string()))?;
        let version = existing.map_or(1, |record| record.version + 1);
        entry.server_version = Some(version);
        entry.sync_status = SyncStatus::Synced;
        records.insert(
            submission.entity_id.clone(),
            Record {
                entry,
                version,
                last_payload: submission.payload.clone(),
            },
        );
        Ok(SubmitOutcome::Accepted {
            server_version: Some(version),
        })
    }

    async fn fetch_canonical(&self, id: &EntryId) -> SyncResult<Option<FieldEntry>> {
        Ok(self.record(id).map(|record| record.entry))
    }
}

type Engine = SyncEngine<Arc<InMemoryServer>, Arc<StaticConnectivity>>;

struct Device {
    service: EntryService,
    server: Arc<InMemoryServer>,
    connectivity: Arc<StaticConnectivity>,
    engine: Engine,
}

impl Device {
    fn new() -> Self {
        let service = EntryService::open_in_memory().unwrap();
        let server = Arc::new(InMemoryServer::default());
        let connectivity = Arc::new(StaticConnectivity::new(true));
        let settings = SyncSettings::new("https://records.example.com")
            .with_request_timeout(Duration::from_secs(2))
            .with_retry(RetryPolicy::immediate());
        let engine = SyncEngine::new(
            service.clone(),
            server.clone(),
            connectivity.clone(),
            settings,
        );
        Self {
            service,
            server,
            connectivity,
            engine,
        }
    }

    async fn status(&self, id: &EntryId) -> SyncStatus {
        self.service.get_entry(id).await.unwrap().unwrap().sync_status
    }

    /// Every unsynced entry has exactly one queue item; synced entries have none.
    async fn assert_queue_invariant(&self) {
        let entries = self.service.list_entries(None, 1_000, 0).await.unwrap();
        let queue = self.service.queue_items().await.unwrap();
        let mut seen = HashSet::new();
        for item in &queue {
            assert!(seen.insert(item.entity_id.clone()), "duplicate queue item");
        }
        for entry in entries {
            let queued = queue
                .iter()
                .filter(|item| item.entity_id == entry.id.as_str())
                .count();
            let expected = usize::from(entry.sync_status != SyncStatus::Synced);
            assert_eq!(queued, expected, "entry {} is {}", entry.id, entry.sync_status);
        }
    }
}

fn reading(well: &str) -> NewFieldEntry {
    let mut new = NewFieldEntry::new(well, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
    new.production.oil = 140.0;
    new.production.gas = 310.0;
    new.production.water = 42.0;
    new.readings.pressure = Some(1200.0);
    new.readings.temperature = Some(180.0);
    new
}

#[tokio::test(flavor = "multi_thread")]
async fn full_pass_submits_in_creation_order() {
    let device = Device::new();
    let mut ids = Vec::new();
    for well in ["W-101", "W-102", "W-103"] {
        ids.push(device.service.create_entry(reading(well)).await.unwrap().id);
    }
    device.assert_queue_invariant().await;

    let report = device.engine.run_pass().await.unwrap();

    let expected = ids.iter().map(EntryId::as_str).collect::<Vec<_>>();
    assert_eq!(device.server.received(), expected);
    assert_eq!(report.synced, expected);
    assert_eq!(device.server.record_count(), 3);
    for id in &ids {
        assert_eq!(device.status(id).await, SyncStatus::Synced);
        let entry = device.service.get_entry(id).await.unwrap().unwrap();
        assert_eq!(entry.server_version, Some(1));
    }
    device.assert_queue_invariant().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failure_leaves_item_queued_and_continues() {
    let device = Device::new();
    let first = device.service.create_entry(reading("W-1")).await.unwrap().id;
    let second = device.service.create_entry(reading("W-2")).await.unwrap().id;
    let third = device.service.create_entry(reading("W-3")).await.unwrap().id;
    device.server.fail_once(&second);

    let report = device.engine.run_pass().await.unwrap();

    assert_eq!(report.submitted.len(), 3);
    assert_eq!(device.status(&first).await, SyncStatus::Synced);
    assert_eq!(device.status(&second).await, SyncStatus::Failed);
    assert_eq!(device.status(&third).await, SyncStatus::Synced);

    let queue = device.service.queue_items().await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].entity_id, second.as_str());
    assert_eq!(queue[0].retry_count, 1);
    device.assert_queue_invariant().await;

    device.engine.run_pass().await.unwrap();
    assert_eq!(device.status(&second).await, SyncStatus::Synced);
    assert!(device.service.queue_items().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_trigger_changes_nothing() {
    let device = Device::new();
    let id = device.service.create_entry(reading("W-1")).await.unwrap().id;
    let queue_before = device.service.queue_items().await.unwrap();
    device.connectivity.set_online(false);

    let report = device.engine.run_pass().await.unwrap();

    assert!(report.offline);
    assert!(device.server.received().is_empty());
    assert_eq!(device.service.queue_items().await.unwrap(), queue_before);
    assert_eq!(device.status(&id).await, SyncStatus::Pending);
    assert_eq!(device.engine.state(), PassState::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_edits_replace_the_queued_payload() {
    let device = Device::new();
    let id = device.service.create_entry(reading("W-1")).await.unwrap().id;

    for notes in ["choke adjusted", "choke adjusted, wellhead leak fixed"] {
        let patch = EntryPatch {
            notes: Some(notes.to_string()),
            ..EntryPatch::default()
        };
        device.service.update_entry(&id, &patch).await.unwrap();
    }

    let queue = device.service.queue_items().await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].action, SyncAction::Create);
    assert_eq!(
        queue[0].payload["notes"],
        "choke adjusted, wellhead leak fixed"
    );

    device.engine.run_pass().await.unwrap();
    let record = device.server.record(&id).unwrap();
    assert_eq!(record.entry.notes, "choke adjusted, wellhead leak fixed");
}

#[tokio::test(flavor = "multi_thread")]
async fn resubmitting_the_same_payload_creates_one_record() {
    let device = Device::new();
    let id = device.service.create_entry(reading("W-1")).await.unwrap().id;
    let item = device.service.queue_item(&id).await.unwrap().unwrap();
    let submission = Submission::from_queue_item(&item);

    let first = device.server.submit(&submission).await.unwrap();
    let replay = device.server.submit(&submission).await.unwrap();

    assert_eq!(first, replay);
    assert_eq!(device.server.record_count(), 1);

    // The engine still drains its own single item without duplicating it.
    device.engine.run_pass().await.unwrap();
    assert_eq!(device.server.record_count(), 1);
    assert_eq!(device.status(&id).await, SyncStatus::Synced);
}

async fn conflicted_entry(device: &Device) -> EntryId {
    let id = device.service.create_entry(reading("W-9")).await.unwrap().id;
    device.engine.run_pass().await.unwrap();

    device
        .server
        .edit_remotely(&id, |entry| entry.readings.pressure = Some(1250.0));
    let patch = EntryPatch {
        notes: Some("gauge re-read".to_string()),
        ..EntryPatch::default()
    };
    device.service.update_entry(&id, &patch).await.unwrap();

    let report = device.engine.run_pass().await.unwrap();
    assert_eq!(report.conflicted, vec![id.as_str()]);
    id
}

#[tokio::test(flavor = "multi_thread")]
async fn conflict_detects_pressure_and_server_choice_syncs() {
    let device = Device::new();
    let id = conflicted_entry(&device).await;

    assert_eq!(device.status(&id).await, SyncStatus::Conflicted);
    let info = device.service.conflict_info(&id).await.unwrap().unwrap();
    assert_eq!(info.field_paths(), vec!["pressure"]);
    device.assert_queue_invariant().await;

    device
        .service
        .resolve_conflict(&id, ResolutionStrategy::Server, "supervisor")
        .await
        .unwrap();

    let entry = device.service.get_entry(&id).await.unwrap().unwrap();
    assert_eq!(entry.sync_status, SyncStatus::Synced);
    assert_eq!(entry.readings.pressure, Some(1250.0));
    assert!(device.service.queue_item(&id).await.unwrap().is_none());
    device.assert_queue_invariant().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn conflict_local_choice_requeues_update() {
    let device = Device::new();
    let id = conflicted_entry(&device).await;

    device
        .service
        .resolve_conflict(&id, ResolutionStrategy::Local, "operator")
        .await
        .unwrap();

    let item = device.service.queue_item(&id).await.unwrap().unwrap();
    assert_eq!(item.action, SyncAction::Update);
    assert_eq!(item.payload["readings"]["pressure"], 1200.0);
    assert_eq!(device.status(&id).await, SyncStatus::Pending);

    device.engine.run_pass().await.unwrap();
    assert_eq!(device.status(&id).await, SyncStatus::Synced);
    let record = device.server.record(&id).unwrap();
    assert_eq!(record.entry.readings.pressure, Some(1200.0));
    assert_eq!(record.version, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_keeps_the_higher_pressure_reading() {
    let device = Device::new();
    let id = conflicted_entry(&device).await;

    let resolution = device
        .service
        .resolve_conflict(&id, ResolutionStrategy::Merge, "operator")
        .await
        .unwrap();

    assert_eq!(resolution.entry.readings.pressure, Some(1250.0));
    assert_eq!(resolution.entry.notes, "gauge re-read");
    assert!(resolution.resubmit);
    device.engine.run_pass().await.unwrap();
    assert_eq!(device.status(&id).await, SyncStatus::Synced);
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_made_while_submitting_syncs_without_conflict() {
    let device = Device::new();
    let id = device.service.create_entry(reading("W-6")).await.unwrap().id;
    let patch = EntryPatch {
        pressure: Some(Some(1325.0)),
        ..EntryPatch::default()
    };
    device
        .server
        .edit_during_next_submit(device.service.clone(), id, patch);

    let first = device.engine.run_pass().await.unwrap();
    assert_eq!(first.superseded, vec![id.as_str()]);
    assert_eq!(device.server.record(&id).unwrap().version, 1);
    let entry = device.service.get_entry(&id).await.unwrap().unwrap();
    assert_eq!(entry.sync_status, SyncStatus::Pending);
    assert_eq!(entry.server_version, Some(1));
    let item = device.service.queue_item(&id).await.unwrap().unwrap();
    assert_eq!(item.action, SyncAction::Update);
    device.assert_queue_invariant().await;

    let second = device.engine.run_pass().await.unwrap();
    assert!(second.conflicted.is_empty());
    assert_eq!(second.synced, vec![id.as_str()]);

    let record = device.server.record(&id).unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.entry.readings.pressure, Some(1325.0));
    let entry = device.service.get_entry(&id).await.unwrap().unwrap();
    assert_eq!(entry.sync_status, SyncStatus::Synced);
    assert_eq!(entry.server_version, Some(2));
    device.assert_queue_invariant().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn edits_after_sync_carry_the_latest_server_version() {
    let device = Device::new();
    let id = device.service.create_entry(reading("W-7")).await.unwrap().id;
    device.engine.run_pass().await.unwrap();

    for (round, water) in [(2, 48.0), (3, 51.5)] {
        let patch = EntryPatch {
            water: Some(water),
            ..EntryPatch::default()
        };
        device.service.update_entry(&id, &patch).await.unwrap();
        let item = device.service.queue_item(&id).await.unwrap().unwrap();
        assert_eq!(item.payload["serverVersion"], round - 1);

        let report = device.engine.run_pass().await.unwrap();
        assert_eq!(report.synced, vec![id.as_str()]);
        assert!(report.conflicted.is_empty());
        assert_eq!(device.server.record(&id).unwrap().version, round);
        let entry = device.service.get_entry(&id).await.unwrap().unwrap();
        assert_eq!(entry.server_version, Some(round));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_entry_is_removed_remotely() {
    let device = Device::new();
    let id = device.service.create_entry(reading("W-4")).await.unwrap().id;
    device.engine.run_pass().await.unwrap();

    device.service.delete_entry(&id).await.unwrap();
    let item = device.service.queue_item(&id).await.unwrap().unwrap();
    assert_eq!(item.action, SyncAction::Delete);

    device.engine.run_pass().await.unwrap();
    assert!(device.server.record(&id).is_none());
    assert!(device.service.queue_item(&id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn store_survives_reopen_with_queue_intact() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("device.db");

    let id = {
        let service = EntryService::open_path(&path).unwrap();
        service.create_entry(reading("W-5")).await.unwrap().id
    };

    let service = EntryService::open_path(&path).unwrap();
    let entry = service.get_entry(&id).await.unwrap().unwrap();
    assert_eq!(entry.sync_status, SyncStatus::Pending);
    assert_eq!(service.queue_items().await.unwrap().len(), 1);
    assert_eq!(service.events_for(&id.as_str()).await.unwrap().len(), 1);
}
