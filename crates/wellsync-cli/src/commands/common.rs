use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use wellsync_core::models::{
    Checklist, ConflictInfo, EntryPatch, EventLogEntry, GpsFix, NewFieldEntry, Readiness,
    SyncQueueItem,
};
use wellsync_core::sync::SyncReport;
use wellsync_core::{EntryService, FieldEntry, RetryPolicy};

use crate::cli::EntryFieldArgs;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryListItem {
    pub id: String,
    pub well_id: String,
    pub entry_date: String,
    pub sync_status: String,
    pub oil: f64,
    pub gas: f64,
    pub water: f64,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListItem {
    pub entity_id: String,
    pub action: String,
    pub readiness: Readiness,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub revision: i64,
}

pub fn open_service(db_path: &Path) -> Result<EntryService, CliError> {
    Ok(EntryService::open_path(db_path)?)
}

pub async fn resolve_entry(raw: &str, service: &EntryService) -> Result<FieldEntry, CliError> {
    let normalized = normalize_entry_identifier(raw)?;
    let id = service.resolve_entry_id(&normalized).await?;
    service
        .get_entry(&id)
        .await?
        .ok_or_else(|| CliError::Core(wellsync_core::Error::NotFound(normalized)))
}

pub async fn list_all_entries(service: &EntryService) -> Result<Vec<FieldEntry>, CliError> {
    const PAGE_SIZE: usize = 500;

    let mut entries = Vec::new();
    let mut offset = 0usize;

    loop {
        let batch = service.list_entries(None, PAGE_SIZE, offset).await?;
        let count = batch.len();
        entries.extend(batch);

        if count < PAGE_SIZE {
            break;
        }
        offset += count;
    }

    Ok(entries)
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse `name=bool` for `--check`.
pub fn parse_check_item(raw: &str) -> Result<(String, bool), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=BOOL, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("checklist item name cannot be empty".to_string());
    }
    let value = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => true,
        "false" | "no" | "n" | "0" => false,
        other => return Err(format!("'{other}' is not a boolean")),
    };
    Ok((name.to_string(), value))
}

pub fn location_from_args(args: &EntryFieldArgs) -> Result<Option<GpsFix>, CliError> {
    match (args.lat, args.lon) {
        (Some(latitude), Some(longitude)) => Ok(Some(GpsFix {
            latitude,
            longitude,
            accuracy_m: args.accuracy.unwrap_or(0.0),
        })),
        (None, None) => Ok(None),
        _ => Err(CliError::InvalidArgument(
            "--lat and --lon must be given together".to_string(),
        )),
    }
}

pub fn apply_new_entry_fields(
    new: &mut NewFieldEntry,
    args: &EntryFieldArgs,
) -> Result<(), CliError> {
    new.production.oil = args.oil.unwrap_or(0.0);
    new.production.gas = args.gas.unwrap_or(0.0);
    new.production.water = args.water.unwrap_or(0.0);
    new.readings.pressure = args.pressure;
    new.readings.temperature = args.temperature;
    if let Some(notes) = &args.notes {
        new.notes = notes.trim().to_string();
    }
    new.photos.clone_from(&args.photos);
    if !args.checks.is_empty() {
        let mut checklist = Checklist::default();
        for (name, value) in &args.checks {
            checklist.set(name.clone(), *value);
        }
        new.checklist = Some(checklist);
    }
    new.location = location_from_args(args)?;
    Ok(())
}

pub struct ClearFlags {
    pub pressure: bool,
    pub temperature: bool,
    pub checklist: bool,
    pub location: bool,
}

pub fn build_patch(
    well: Option<String>,
    date: Option<chrono::NaiveDate>,
    args: &EntryFieldArgs,
    clear: &ClearFlags,
) -> Result<EntryPatch, CliError> {
    let location = location_from_args(args)?;
    let patch = EntryPatch {
        well_id: well.map(|well| well.trim().to_string()),
        entry_date: date,
        oil: args.oil,
        gas: args.gas,
        water: args.water,
        pressure: if clear.pressure {
            Some(None)
        } else {
            args.pressure.map(Some)
        },
        temperature: if clear.temperature {
            Some(None)
        } else {
            args.temperature.map(Some)
        },
        notes: args.notes.as_ref().map(|notes| notes.trim().to_string()),
        photos: (!args.photos.is_empty()).then(|| args.photos.clone()),
        checklist_items: args.checks.clone(),
        clear_checklist: clear.checklist,
        location: if clear.location {
            Some(None)
        } else {
            location.map(Some)
        },
    };

    if patch.is_empty() {
        Err(CliError::EmptyEdit)
    } else {
        Ok(patch)
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

pub fn format_entry_lines(entries: &[FieldEntry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let relative_time = format_relative_time(entry.updated_at, now_ms);
            format!(
                "{:<13}  {:<12}  {}  {:<10}  oil={} gas={} water={}  {relative_time}",
                short_id(&entry.id.as_str()),
                entry.well_id,
                entry.entry_date,
                entry.sync_status,
                entry.production.oil,
                entry.production.gas,
                entry.production.water,
            )
        })
        .collect()
}

pub fn entry_to_list_item(entry: &FieldEntry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        id: entry.id.to_string(),
        well_id: entry.well_id.clone(),
        entry_date: entry.entry_date.to_string(),
        sync_status: entry.sync_status.to_string(),
        oil: entry.production.oil,
        gas: entry.production.gas,
        water: entry.production.water,
        pressure: entry.readings.pressure,
        temperature: entry.readings.temperature,
        updated_at: entry.updated_at,
        relative_time: format_relative_time(entry.updated_at, now_ms),
    }
}

pub fn format_entry_detail(entry: &FieldEntry) -> Vec<String> {
    let mut lines = vec![
        format!("id:          {}", entry.id),
        format!("well:        {}", entry.well_id),
        format!("date:        {}", entry.entry_date),
        format!("status:      {}", entry.sync_status),
        format!(
            "production:  oil={} gas={} water={}",
            entry.production.oil, entry.production.gas, entry.production.water
        ),
        format!(
            "readings:    pressure={} temperature={}",
            format_optional(entry.readings.pressure),
            format_optional(entry.readings.temperature)
        ),
    ];
    if !entry.notes.is_empty() {
        lines.push(format!("notes:       {}", entry.notes));
    }
    if !entry.photos.is_empty() {
        lines.push(format!("photos:      {}", entry.photos.join(", ")));
    }
    if let Some(checklist) = &entry.checklist {
        let items = checklist
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!("checklist:   {items}"));
    }
    if let Some(location) = &entry.location {
        lines.push(format!(
            "location:    {:.6},{:.6} (±{}m)",
            location.latitude, location.longitude, location.accuracy_m
        ));
    }
    lines.push(format!(
        "updated:     {}",
        format_timestamp(entry.updated_at)
    ));
    if let Some(version) = entry.server_version {
        lines.push(format!("server ver:  {version}"));
    }
    lines
}

pub fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

pub fn queue_to_list_item(item: &SyncQueueItem, policy: &RetryPolicy, now: i64) -> QueueListItem {
    QueueListItem {
        entity_id: item.entity_id.clone(),
        action: item.action.to_string(),
        readiness: item.readiness(policy, now),
        retry_count: item.retry_count,
        last_error: item.last_error.clone(),
        created_at: item.created_at,
        revision: item.revision,
    }
}

pub fn format_queue_lines(items: &[SyncQueueItem], policy: &RetryPolicy, now: i64) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let mut line = format!(
                "{:<13}  {:<6}  {:<11}  retries={}  queued {}",
                short_id(&item.entity_id),
                item.action,
                item.readiness(policy, now).as_str(),
                item.retry_count,
                format_relative_time(item.created_at, now)
            );
            if let Some(error) = &item.last_error {
                line.push_str("  last error: ");
                line.push_str(error);
            }
            line
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[ConflictInfo]) -> Vec<String> {
    let mut lines = Vec::new();
    for conflict in conflicts {
        let local = &conflict.local_version;
        lines.push(format!(
            "{:<13}  {}  {}  fields: {}",
            short_id(&local.id.as_str()),
            local.well_id,
            local.entry_date,
            conflict.field_paths().join(", ")
        ));
        for path in &conflict.conflict_fields {
            lines.push(format!(
                "    {:<24} local={}  server={}",
                path.path(),
                path.describe(local),
                path.describe(&conflict.server_version)
            ));
        }
    }
    lines
}

pub fn format_event_lines(events: &[EventLogEntry]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            let entity = event
                .entity_id
                .as_deref()
                .map_or_else(|| event.entity_type.clone(), short_id);
            format!(
                "{}  {:<24}  {:<13}  {}",
                format_timestamp(event.created_at),
                event.event_type,
                entity,
                event.payload
            )
        })
        .collect()
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    if report.skipped_already_running {
        return vec!["A sync pass is already running; nothing to do.".to_string()];
    }
    if report.offline {
        return vec!["Offline; queued changes stay on this device.".to_string()];
    }

    let mut lines = vec![format!(
        "Submitted {}: {} synced, {} conflicted, {} failed",
        report.submitted.len(),
        report.synced.len() + report.superseded.len(),
        report.conflicted.len(),
        report.transient_failures.len() + report.permanent_failures.len()
    )];
    let groups = [
        ("conflict (run `wellsync conflicts`)", &report.conflicted),
        ("will retry", &report.transient_failures),
        ("rejected by server", &report.permanent_failures),
        ("backing off", &report.deferred),
        ("retry limit reached (run `wellsync sync retry <id>`)", &report.exhausted),
    ];
    for (label, ids) in groups {
        for id in ids {
            lines.push(format!("  {}  {label}", short_id(id)));
        }
    }
    if report.recovered > 0 {
        lines.push(format!(
            "Recovered {} change(s) left in flight by an earlier run",
            report.recovered
        ));
    }
    if report.interrupted {
        lines.push("Connectivity lost; remaining changes wait for the next pass.".to_string());
    }
    lines
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn default_resolver_name() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .ok()
        .and_then(|name| wellsync_core::util::normalize_text_option(Some(name)))
        .unwrap_or_else(|| "cli".to_string())
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("WELLSYNC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wellsync")
        .join("wellsync.db")
}
