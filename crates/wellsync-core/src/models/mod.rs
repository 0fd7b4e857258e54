//! Data models for Wellsync

mod conflict;
mod entry;
mod event;
mod queue;

pub use conflict::{ConflictInfo, FieldPath, ResolutionStrategy, ScalarField};
pub use entry::{
    Checklist, EntryId, EntryPatch, EquipmentReadings, FieldEntry, GpsFix, NewFieldEntry,
    ProductionVolumes, SyncStatus, FIELD_ENTRY_ENTITY,
};
pub use event::{EventLogEntry, EventType};
pub use queue::{Readiness, SyncAction, SyncQueueItem};
