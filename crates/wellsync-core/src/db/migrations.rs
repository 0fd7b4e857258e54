//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply one migration atomically.
fn apply(conn: &Connection, version: i32, sql: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    tx.commit()?;

    tracing::info!("Migrated local store to version {version} (target {CURRENT_VERSION})");
    Ok(())
}

/// Migration to version 1: entries, sync queue, event log
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS field_entries (
            id TEXT PRIMARY KEY,
            well_id TEXT NOT NULL,
            entry_date TEXT NOT NULL,
            oil_volume REAL NOT NULL DEFAULT 0,
            gas_volume REAL NOT NULL DEFAULT 0,
            water_volume REAL NOT NULL DEFAULT 0,
            pressure REAL,
            temperature REAL,
            notes TEXT NOT NULL DEFAULT '',
            photos TEXT NOT NULL DEFAULT '[]',
            checklist TEXT,
            location TEXT,
            sync_status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            server_version INTEGER,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            conflict_server_version TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_field_entries_status ON field_entries(sync_status);
        CREATE INDEX IF NOT EXISTS idx_field_entries_updated ON field_entries(updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_field_entries_well ON field_entries(well_id, entry_date);
        CREATE TABLE IF NOT EXISTS sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL UNIQUE,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            last_attempted_at INTEGER,
            revision INTEGER NOT NULL DEFAULT 1,
            held INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_sync_queue_order ON sync_queue(created_at, id);
        CREATE TABLE IF NOT EXISTS event_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_event_log_entity ON event_log(entity_id, id);",
    )
}

/// Migration to version 2: make the event log append-only at the storage layer
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        "CREATE TRIGGER IF NOT EXISTS event_log_no_update BEFORE UPDATE ON event_log
         BEGIN
             SELECT RAISE(ABORT, 'event_log is append-only');
         END;
         CREATE TRIGGER IF NOT EXISTS event_log_no_delete BEFORE DELETE ON event_log
         BEGIN
             SELECT RAISE(ABORT, 'event_log is append-only');
         END;",
    )
}
