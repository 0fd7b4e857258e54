use std::path::Path;

use chrono::NaiveDate;

use crate::cli::EntryFieldArgs;
use crate::commands::common::{build_patch, open_service, resolve_entry, ClearFlags};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    well: Option<String>,
    date: Option<NaiveDate>,
    fields: &EntryFieldArgs,
    clear: &ClearFlags,
    db_path: &Path,
) -> Result<(), CliError> {
    let patch = build_patch(well, date, fields, clear)?;

    let service = open_service(db_path)?;
    let entry = resolve_entry(id, &service).await?;
    let updated = service.update_entry(&entry.id, &patch).await?;

    println!("{} {}", updated.id, updated.sync_status);
    Ok(())
}
