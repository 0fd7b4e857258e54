use std::path::Path;

use chrono::NaiveDate;
use wellsync_core::models::NewFieldEntry;

use crate::cli::EntryFieldArgs;
use crate::commands::common::{apply_new_entry_fields, open_service};
use crate::error::CliError;

pub async fn run_add(
    well: &str,
    date: NaiveDate,
    fields: &EntryFieldArgs,
    db_path: &Path,
) -> Result<(), CliError> {
    let mut new = NewFieldEntry::new(well, date);
    apply_new_entry_fields(&mut new, fields)?;

    let service = open_service(db_path)?;
    let entry = service.create_entry(new).await?;

    println!("{}", entry.id);
    Ok(())
}
