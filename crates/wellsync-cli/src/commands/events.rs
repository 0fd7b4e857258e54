use std::path::Path;

use crate::commands::common::{format_event_lines, open_service, resolve_entry};
use crate::error::CliError;

pub async fn run_events(
    entity: Option<&str>,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let events = if let Some(entity) = entity {
        let entry = resolve_entry(entity, &service).await?;
        let mut events = service.events_for(&entry.id.as_str()).await?;
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
        events
    } else {
        let mut events = service.recent_events(limit).await?;
        events.reverse();
        events
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else if events.is_empty() {
        println!("No events recorded.");
    } else {
        for line in format_event_lines(&events) {
            println!("{line}");
        }
    }

    Ok(())
}
