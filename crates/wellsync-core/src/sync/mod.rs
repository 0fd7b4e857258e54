//! Draining the sync queue against the system of record.

mod engine;
mod error;
mod http;
mod remote;

pub use engine::{PassState, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use http::HttpRemote;
pub use remote::{
    Connectivity, RemoteEndpoint, StaticConnectivity, SubmitOutcome, Submission,
    TenantCredentials, Unreachable,
};
