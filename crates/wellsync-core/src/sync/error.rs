//! Per-item sync failure taxonomy.

use thiserror::Error;

/// Result type for remote calls.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Why a single submission or fetch did not complete.
///
/// None of these abort a pass; they are recorded against the item and the
/// pass moves on. A conflict is not an error and is reported as an outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network failure or server-side error.
    #[error("transient sync failure: {0}")]
    Transient(String),

    /// The call did not finish within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Connectivity dropped before or during the call.
    #[error("device is offline")]
    Offline,

    /// Server rejected the mutation (validation or other 4xx).
    #[error("rejected by server: {0}")]
    Permanent(String),

    /// Response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Whether the item should simply be tried again on a later pass.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}
