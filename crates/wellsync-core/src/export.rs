//! Field data export for post-hoc debugging of sync behaviour.

use serde::Serialize;

use crate::models::{EventLogEntry, FieldEntry};

/// Export document: every entry plus the full event history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument<'a> {
    pub exported_at: i64,
    pub entry_count: usize,
    pub event_count: usize,
    pub entries: &'a [FieldEntry],
    pub events: &'a [EventLogEntry],
}

/// Render entries and events as pretty-printed JSON.
pub fn render_json_export(
    entries: &[FieldEntry],
    events: &[EventLogEntry],
    exported_at: i64,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExportDocument {
        exported_at,
        entry_count: entries.len(),
        event_count: events.len(),
        entries,
        events,
    })
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(timestamp_ms: i64) -> String {
    format!("wellsync-export-{timestamp_ms}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, NewFieldEntry};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn render_json_export_includes_entries_and_events() {
        let entry = NewFieldEntry::new("W-7", NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
            .into_entry(1_000);
        let event = EventLogEntry {
            id: 1,
            event_type: EventType::EntryCreated,
            entity_type: "field_entry".to_string(),
            entity_id: Some(entry.id.as_str()),
            payload: json!({ "wellId": "W-7" }),
            created_at: 1_000,
        };

        let rendered = render_json_export(&[entry.clone()], &[event], 2_000).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["exportedAt"], 2_000);
        assert_eq!(value["entryCount"], 1);
        assert_eq!(value["entries"][0]["wellId"], "W-7");
        assert_eq!(value["events"][0]["entityId"], entry.id.as_str());
    }

    #[test]
    fn suggested_export_file_name_is_timestamped() {
        assert_eq!(
            suggested_export_file_name(123),
            "wellsync-export-123.json"
        );
    }
}
