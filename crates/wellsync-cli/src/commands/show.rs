use std::path::Path;

use serde_json::json;

use crate::commands::common::{
    format_entry_detail, format_event_lines, open_service, resolve_entry,
};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let entry = resolve_entry(id, &service).await?;
    let events = service.events_for(&entry.id.as_str()).await?;
    let queued = service.queue_item(&entry.id).await?;

    if as_json {
        let document = json!({
            "entry": entry,
            "queueItem": queued,
            "events": events,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    for line in format_entry_detail(&entry) {
        println!("{line}");
    }
    if let Some(item) = queued {
        println!(
            "queued:      {} (retries={}{})",
            item.action,
            item.retry_count,
            item.last_error
                .map(|error| format!(", last error: {error}"))
                .unwrap_or_default()
        );
    }
    println!();
    println!("history:");
    for line in format_event_lines(&events) {
        println!("  {line}");
    }
    Ok(())
}
