//! Conflict detection and resolution.
//!
//! Detection compares a local pending entry against the server's canonical
//! version field by field. Each field belongs to one category (scalar,
//! checklist entry, location) with its own comparator; location is compared
//! as one unit so a moved fix shows up as a single `location` difference.
//!
//! Resolution applies exactly one [`ResolutionStrategy`](crate::models::ResolutionStrategy)
//! chosen by the caller. Conflicts are never resolved without one.

mod detect;
mod resolve;

pub use detect::detect;
pub use resolve::{resolve, safety_pick, Resolution, SafetyDecision};
