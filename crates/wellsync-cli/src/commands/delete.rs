use std::path::Path;

use crate::commands::common::{open_service, resolve_entry};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let entry = resolve_entry(id, &service).await?;

    service.delete_entry(&entry.id).await?;
    println!("{}", entry.id);
    Ok(())
}
