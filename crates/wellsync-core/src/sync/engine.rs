//! Sync pass orchestration.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use serde::Serialize;

use crate::config::SyncSettings;
use crate::db::{FailureKind, SyncedOutcome};
use crate::error::Result;
use crate::models::{ConflictInfo, EntryId, FieldEntry, Readiness, SyncQueueItem};
use crate::services::EntryService;
use crate::util::now_millis;

use super::error::{SyncError, SyncResult};
use super::remote::{Connectivity, RemoteEndpoint, SubmitOutcome, Submission};

/// Lifecycle of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassState {
    Idle,
    Running,
    /// Last pass stopped early because connectivity dropped
    Interrupted,
}

impl PassState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Interrupted => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Interrupted,
            _ => Self::Idle,
        }
    }
}

/// What one pass did, by entity id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Another pass was running; nothing was touched
    pub skipped_already_running: bool,
    /// Offline at pass start; nothing was touched
    pub offline: bool,
    /// Connectivity dropped mid-pass
    pub interrupted: bool,
    /// Entries returned from `syncing` to `pending` before draining
    pub recovered: usize,
    /// Submission order
    pub submitted: Vec<String>,
    pub synced: Vec<String>,
    /// Accepted, but a newer local edit is still queued
    pub superseded: Vec<String>,
    pub conflicted: Vec<String>,
    pub transient_failures: Vec<String>,
    pub permanent_failures: Vec<String>,
    /// Still inside their backoff window
    pub deferred: Vec<String>,
    /// Held back by the attempt cap
    pub exhausted: Vec<String>,
}

impl SyncReport {
    /// Whether every submitted item ended synced.
    pub fn is_clean(&self) -> bool {
        self.conflicted.is_empty()
            && self.transient_failures.is_empty()
            && self.permanent_failures.is_empty()
            && !self.interrupted
    }
}

/// Clears the running flag however the pass ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drains the sync queue against the remote system of record.
///
/// Items are submitted one at a time in queue order. Per-item failures are
/// recorded and the pass moves on; only local storage errors abort it.
pub struct SyncEngine<R: RemoteEndpoint, C: Connectivity> {
    service: EntryService,
    remote: R,
    connectivity: C,
    settings: SyncSettings,
    running: AtomicBool,
    state: AtomicU8,
}

impl<R: RemoteEndpoint, C: Connectivity> SyncEngine<R, C> {
    pub const fn new(
        service: EntryService,
        remote: R,
        connectivity: C,
        settings: SyncSettings,
    ) -> Self {
        Self {
            service,
            remote,
            connectivity,
            settings,
            running: AtomicBool::new(false),
            state: AtomicU8::new(PassState::Idle.to_u8()),
        }
    }

    pub fn state(&self) -> PassState {
        PassState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn set_state(&self, state: PassState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Run one pass. A trigger while a pass is running is a no-op.
    pub async fn run_pass(&self) -> Result<SyncReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync pass already running; trigger ignored");
            return Ok(SyncReport {
                skipped_already_running: true,
                ..SyncReport::default()
            });
        }
        let _guard = RunningGuard(&self.running);

        if !self.connectivity.is_online().await {
            tracing::info!("Offline; sync pass skipped");
            self.set_state(PassState::Idle);
            return Ok(SyncReport {
                offline: true,
                ..SyncReport::default()
            });
        }

        self.set_state(PassState::Running);
        tracing::info!("Sync pass started");

        let result = self.drain().await;
        match &result {
            Ok(report) if report.interrupted => self.set_state(PassState::Interrupted),
            _ => self.set_state(PassState::Idle),
        }

        if let Ok(report) = &result {
            tracing::info!(
                "Sync pass finished: {} submitted, {} synced, {} conflicted, {} failed, {} deferred",
                report.submitted.len(),
                report.synced.len(),
                report.conflicted.len(),
                report.transient_failures.len() + report.permanent_failures.len(),
                report.deferred.len() + report.exhausted.len()
            );
        }
        result
    }

    async fn drain(&self) -> Result<SyncReport> {
        let mut report = SyncReport {
            recovered: self.service.recover_interrupted().await?,
            ..SyncReport::default()
        };

        let now = now_millis();
        let items = self.service.queue_items().await?;

        for (index, item) in items.iter().enumerate() {
            match item.readiness(&self.settings.retry, now) {
                Readiness::Ready => {}
                Readiness::Held => continue,
                Readiness::BackingOff => {
                    report.deferred.push(item.entity_id.clone());
                    continue;
                }
                Readiness::Exhausted => {
                    report.exhausted.push(item.entity_id.clone());
                    continue;
                }
            }

            if !self.connectivity.is_online().await {
                let remaining = items[index..]
                    .iter()
                    .filter(|item| !item.held)
                    .map(|item| item.entity_id.clone())
                    .collect::<Vec<_>>();
                tracing::warn!(
                    "Connectivity lost; {} queued item(s) left for the next pass",
                    remaining.len()
                );
                self.service.log_interrupted(&remaining).await?;
                report.interrupted = true;
                break;
            }

            let Ok(id) = item.entity_id.parse::<EntryId>() else {
                tracing::warn!(
                    "Skipping queue item {} with unknown entity id {}",
                    item.id,
                    item.entity_id
                );
                continue;
            };

            // Pick up edits made since the snapshot was taken.
            let Some(current) = self.service.queue_item(&id).await? else {
                continue;
            };
            if current.held {
                continue;
            }

            self.process(&id, &current, &mut report).await?;
        }

        Ok(report)
    }

    async fn process(
        &self,
        id: &EntryId,
        item: &SyncQueueItem,
        report: &mut SyncReport,
    ) -> Result<()> {
        let key = item.entity_id.clone();
        self.service.mark_syncing(id).await?;
        report.submitted.push(key.clone());

        let submission = Submission::from_queue_item(item);
        tracing::debug!(
            "Submitting {} {} (revision {})",
            submission.action,
            key,
            item.revision
        );

        match self.with_timeout(self.remote.submit(&submission)).await {
            Ok(SubmitOutcome::Accepted { server_version }) => {
                match self
                    .service
                    .mark_synced(id, item.revision, server_version)
                    .await?
                {
                    SyncedOutcome::Synced => report.synced.push(key),
                    SyncedOutcome::Superseded => {
                        tracing::debug!("Entry {key} was edited while in flight; kept queued");
                        report.superseded.push(key);
                    }
                }
            }
            Ok(SubmitOutcome::Conflict) => self.handle_conflict(id, item, report).await?,
            Ok(SubmitOutcome::ValidationError(message)) => {
                self.record_failure(id, &message, FailureKind::Permanent, report)
                    .await?;
            }
            Ok(SubmitOutcome::ServerError(message)) => {
                self.record_failure(id, &message, FailureKind::Transient, report)
                    .await?;
            }
            Err(error) => {
                let kind = if error.is_retryable() {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                };
                self.record_failure(id, &error.to_string(), kind, report)
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle_conflict(
        &self,
        id: &EntryId,
        item: &SyncQueueItem,
        report: &mut SyncReport,
    ) -> Result<()> {
        let server = match self.with_timeout(self.remote.fetch_canonical(id)).await {
            Ok(Some(server)) => server,
            Ok(None) => {
                let reason = "server reported a conflict but returned no canonical version";
                return self
                    .record_failure(id, reason, FailureKind::Permanent, report)
                    .await;
            }
            Err(error) => {
                let reason = format!("canonical fetch failed: {error}");
                return self
                    .record_failure(id, &reason, FailureKind::Transient, report)
                    .await;
            }
        };

        let local = match self.service.get_entry(id).await? {
            Some(entry) => entry,
            None => FieldEntry::from_snapshot(item.payload.clone())?,
        };
        let info = ConflictInfo::new(local, server);
        tracing::info!(
            "Conflict on entry {id}: {}",
            info.field_paths().join(", ")
        );

        self.service.mark_conflicted(id, &info).await?;
        report.conflicted.push(item.entity_id.clone());
        Ok(())
    }

    async fn record_failure(
        &self,
        id: &EntryId,
        reason: &str,
        kind: FailureKind,
        report: &mut SyncReport,
    ) -> Result<()> {
        match kind {
            FailureKind::Transient => {
                tracing::warn!("Transient sync failure for {id}: {reason}");
                report.transient_failures.push(id.to_string());
            }
            FailureKind::Permanent => {
                tracing::warn!("Server rejected {id}; needs attention: {reason}");
                report.permanent_failures.push(id.to_string());
            }
        }
        self.service.mark_failed(id, reason, kind).await
    }

    async fn with_timeout<T>(
        &self,
        call: impl std::future::Future<Output = SyncResult<T>>,
    ) -> SyncResult<T> {
        tokio::time::timeout(self.settings.request_timeout(), call)
            .await
            .unwrap_or(Err(SyncError::Timeout))
    }
}
