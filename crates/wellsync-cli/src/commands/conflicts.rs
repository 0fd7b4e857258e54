use std::path::Path;

use wellsync_core::models::ResolutionStrategy;

use crate::commands::common::{
    default_resolver_name, format_conflict_lines, format_optional, open_service, resolve_entry,
};
use crate::error::CliError;

pub async fn run_conflicts(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let conflicts = service.list_conflicts().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No unresolved conflicts.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_resolve(
    id: &str,
    strategy: ResolutionStrategy,
    resolved_by: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = open_service(db_path)?;
    let entry = resolve_entry(id, &service).await?;
    let resolved_by = resolved_by.map_or_else(default_resolver_name, str::to_string);

    let resolution = service
        .resolve_conflict(&entry.id, strategy, &resolved_by)
        .await?;

    println!(
        "{} resolved with {strategy}; now {}",
        entry.id, resolution.entry.sync_status
    );
    for decision in &resolution.safety_decisions {
        println!(
            "  {}: local={} server={} kept={}",
            decision.field,
            format_optional(decision.local),
            format_optional(decision.server),
            format_optional(decision.chosen)
        );
    }
    Ok(())
}
