//! Async services shared by clients.

mod entries;

pub use entries::{EntryService, SYNC_PASS_ENTITY};
