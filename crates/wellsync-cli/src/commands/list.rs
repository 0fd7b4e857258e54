use std::path::Path;

use wellsync_core::SyncStatus;

use crate::commands::common::{
    entry_to_list_item, format_entry_lines, open_service, EntryListItem,
};
use crate::error::CliError;

pub async fn run_list(
    status: Option<&str>,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let status = status.map(str::parse::<SyncStatus>).transpose()?;
    let service = open_service(db_path)?;
    let entries = service.list_entries(status, limit, 0).await?;

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entries.is_empty() {
        println!("No entries.");
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
