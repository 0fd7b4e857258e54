pub mod add;
pub mod common;
pub mod completions;
pub mod config;
pub mod conflicts;
pub mod delete;
pub mod edit;
pub mod events;
pub mod export;
pub mod list;
pub mod queue;
pub mod show;
pub mod sync;
