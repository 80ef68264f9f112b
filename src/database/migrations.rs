//! Schema migrations for the replica database.
//!
//! Uses a `schema_version` table to track which migrations have been applied.
//! Each migration runs exactly once and is recorded with a timestamp.

use rusqlite::{params, Connection};

use crate::types::folder::WellKnownFolder;

/// Current schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Returns the current schema version from the database (0 if table doesn't exist).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Runs all pending schema migrations against the provided connection.
///
/// Migrations are versioned: each runs exactly once and is recorded in
/// the `schema_version` table. Safe to call on every startup.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    // Enable WAL and foreign keys (always, not versioned)
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn);

    if current < 1 {
        migration_v1(conn)?;
        record_version(conn, 1, "Initial schema: folders, bookmarks and their edit logs")?;
    }

    if current < 2 {
        migration_v2(conn)?;
        record_version(conn, 2, "Seed well-known folders")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        params![version, now, description],
    )?;
    Ok(())
}

/// V1: Create the four replica tables.
fn migration_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS folders (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            remote_folder_id TEXT,
            title TEXT NOT NULL,
            position INTEGER,
            local_only INTEGER NOT NULL DEFAULT 0,
            well_known TEXT UNIQUE
        );

        CREATE INDEX IF NOT EXISTS idx_folders_title ON folders(title);
        CREATE INDEX IF NOT EXISTS idx_folders_remote_id ON folders(remote_folder_id);

        CREATE TABLE IF NOT EXISTS folder_edits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            folder_local_id INTEGER,
            removed_remote_folder_id TEXT,
            title TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_folder_edits_title ON folder_edits(title);
        CREATE INDEX IF NOT EXISTS idx_folder_edits_folder ON folder_edits(folder_local_id);

        CREATE TABLE IF NOT EXISTS bookmarks (
            bookmark_id INTEGER PRIMARY KEY,
            folder_local_id INTEGER NOT NULL,
            remote_folder_id TEXT,
            title TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL DEFAULT '',
            hash TEXT,
            starred INTEGER NOT NULL DEFAULT 0,
            progress REAL NOT NULL DEFAULT 0,
            progress_timestamp INTEGER NOT NULL DEFAULT 0,
            content_available_locally INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            time INTEGER,
            local_folder_relative_path TEXT,
            FOREIGN KEY (folder_local_id) REFERENCES folders(local_id)
        );

        CREATE INDEX IF NOT EXISTS idx_bookmarks_folder ON bookmarks(folder_local_id);
        CREATE INDEX IF NOT EXISTS idx_bookmarks_starred ON bookmarks(starred);
        CREATE INDEX IF NOT EXISTS idx_bookmarks_url ON bookmarks(url);

        CREATE TABLE IF NOT EXISTS bookmark_edits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            bookmark_id INTEGER,
            url TEXT,
            title TEXT,
            source_folder_local_id INTEGER,
            destination_folder_local_id INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_bookmark_edits_bookmark ON bookmark_edits(bookmark_id);
        CREATE INDEX IF NOT EXISTS idx_bookmark_edits_source ON bookmark_edits(source_folder_local_id);
        CREATE INDEX IF NOT EXISTS idx_bookmark_edits_destination ON bookmark_edits(destination_folder_local_id);
        ",
    )
}

/// V2: Seed the well-known folders. They never enter the edit log.
fn migration_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    for folder in WellKnownFolder::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO folders (remote_folder_id, title, local_only, well_known) VALUES (?1, ?2, ?3, ?4)",
            params![
                folder.remote_id(),
                folder.default_title(),
                folder.is_local_only(),
                folder.as_str()
            ],
        )?;
    }
    Ok(())
}
