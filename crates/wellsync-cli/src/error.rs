use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] wellsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Nothing to change; pass at least one field flag")]
    EmptyEdit,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `wellsync config init --api-base-url <URL> --tenant-id <ID>`, or set WELLSYNC_API_URL and WELLSYNC_TENANT_ID."
    )]
    SyncNotConfigured,
    #[error("WELLSYNC_TENANT_SECRET is not set; it is supplied by your sign-in tooling")]
    MissingTenantSecret,
}
