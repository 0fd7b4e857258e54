//! Remote collaborator contract.
//!
//! The system of record exposes one submission endpoint (idempotent, keyed by
//! entity id) and one canonical-fetch endpoint used only while building a
//! conflict. Both are reached through [`RemoteEndpoint`] so the engine can be
//! driven by an in-process double in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::models::{EntryId, FieldEntry, SyncAction, SyncQueueItem};

use super::error::{SyncError, SyncResult};

/// One entity mutation sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub action: SyncAction,
    pub entity_type: String,
    pub entity_id: String,
    /// Entity snapshot from the queue item
    pub payload: serde_json::Value,
    /// Server version the client last knew about, for conflict detection
    pub known_server_version: Option<i64>,
}

impl Submission {
    /// Build a submission from a queue item.
    pub fn from_queue_item(item: &SyncQueueItem) -> Self {
        let known_server_version = item
            .payload
            .get("serverVersion")
            .and_then(serde_json::Value::as_i64);

        Self {
            action: item.action,
            entity_type: item.entity_type.clone(),
            entity_id: item.entity_id.clone(),
            payload: item.payload.clone(),
            known_server_version,
        }
    }
}

/// How the server answered a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored; carries the server's new version when it reports one
    Accepted { server_version: Option<i64> },
    /// Modified by another actor since the client's known version
    Conflict,
    /// Rejected as invalid (4xx other than conflict)
    ValidationError(String),
    /// Server-side failure (5xx)
    ServerError(String),
}

/// Submission and canonical-fetch endpoints.
#[allow(async_fn_in_trait)]
pub trait RemoteEndpoint {
    /// Submit one mutation. Transport failures are `Err`; server answers are outcomes.
    async fn submit(&self, submission: &Submission) -> SyncResult<SubmitOutcome>;

    /// Fetch the server's current version of an entry. `None` if the server has none.
    async fn fetch_canonical(&self, id: &EntryId) -> SyncResult<Option<FieldEntry>>;
}

impl<T: RemoteEndpoint> RemoteEndpoint for std::sync::Arc<T> {
    async fn submit(&self, submission: &Submission) -> SyncResult<SubmitOutcome> {
        T::submit(self, submission).await
    }

    async fn fetch_canonical(&self, id: &EntryId) -> SyncResult<Option<FieldEntry>> {
        T::fetch_canonical(self, id).await
    }
}

/// Connectivity check made at the start of a pass and before each item.
#[allow(async_fn_in_trait)]
pub trait Connectivity {
    async fn is_online(&self) -> bool;
}

/// Connectivity flag set by the host platform (or a test).
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

impl<T: Connectivity> Connectivity for std::sync::Arc<T> {
    async fn is_online(&self) -> bool {
        T::is_online(self).await
    }
}

/// Remote for a device kept offline on purpose. Needs no server or credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unreachable;

impl RemoteEndpoint for Unreachable {
    async fn submit(&self, _submission: &Submission) -> SyncResult<SubmitOutcome> {
        Err(SyncError::Offline)
    }

    async fn fetch_canonical(&self, _id: &EntryId) -> SyncResult<Option<FieldEntry>> {
        Err(SyncError::Offline)
    }
}

impl Connectivity for Unreachable {
    async fn is_online(&self) -> bool {
        false
    }
}

/// Tenant identity passed through from the external auth component.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantCredentials {
    pub tenant_id: String,
    pub tenant_secret: String,
}

impl TenantCredentials {
    pub fn new(tenant_id: impl Into<String>, tenant_secret: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            tenant_secret: tenant_secret.into(),
        }
    }
}

impl std::fmt::Debug for TenantCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TenantCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("tenant_secret", &"[REDACTED]")
            .finish()
    }
}
