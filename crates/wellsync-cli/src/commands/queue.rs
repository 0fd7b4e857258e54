use std::path::Path;

use wellsync_core::util::now_millis;
use wellsync_core::RetryPolicy;

use crate::commands::common::{format_queue_lines, open_service, queue_to_list_item, QueueListItem};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let items = service.queue_items().await?;
    let policy = RetryPolicy::default();
    let now = now_millis();

    if as_json {
        let json_items = items
            .iter()
            .map(|item| queue_to_list_item(item, &policy, now))
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if items.is_empty() {
        println!("Queue is empty.");
    } else {
        for line in format_queue_lines(&items, &policy, now) {
            println!("{line}");
        }
    }

    Ok(())
}
