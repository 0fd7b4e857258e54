use std::path::Path;

use wellsync_core::config::SyncSettings;
use wellsync_core::sync::{HttpRemote, SyncEngine, Unreachable};

use crate::commands::common::{format_sync_report, open_service, resolve_entry};
use crate::config_profiles::load_remote_config;
use crate::error::CliError;

pub async fn run_sync(
    offline: bool,
    as_json: bool,
    profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let report = if offline {
        // No server is contacted, so no profile or secret is needed.
        let service = open_service(db_path)?;
        SyncEngine::new(service, Unreachable, Unreachable, SyncSettings::new(""))
            .run_pass()
            .await?
    } else {
        let (settings, credentials) = load_remote_config(profile)?;
        let service = open_service(db_path)?;
        let remote = HttpRemote::new(&settings, credentials)?;
        let connectivity = remote.clone();
        SyncEngine::new(service, remote, connectivity, settings)
            .run_pass()
            .await?
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_sync_report(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_sync_retry(id: &str, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let entry = resolve_entry(id, &service).await?;

    service.reset_retries(&entry.id).await?;
    println!("{} will be retried on the next sync", entry.id);
    Ok(())
}
