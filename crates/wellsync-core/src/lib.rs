//! wellsync-core - Core library for Wellsync
//!
//! This crate contains the field entry models, the on-device store with its
//! sync queue and event log, conflict detection and resolution, and the sync
//! engine used by all Wellsync clients.

pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use config::{RetryPolicy, SyncSettings};
pub use error::{Error, Result};
pub use models::{EntryId, FieldEntry, SyncStatus};
pub use services::EntryService;
