//! Unit tests for the Shelfsync database layer (connection + migrations).

use shelfsync::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use shelfsync::database::{Database, StoreLocation};

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_all_tables() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    for table in ["folders", "folder_edits", "bookmarks", "bookmark_edits", "schema_version"] {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Table '{}' should exist after migrations", table);
    }
}

#[test]
fn test_migrations_create_indexes() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let expected_indexes = [
        "idx_folders_title",
        "idx_folders_remote_id",
        "idx_folder_edits_title",
        "idx_bookmarks_folder",
        "idx_bookmarks_starred",
        "idx_bookmark_edits_bookmark",
        "idx_bookmark_edits_source",
        "idx_bookmark_edits_destination",
    ];

    for index in &expected_indexes {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name=?1",
                [index],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Index '{}' should exist after migrations", index);
    }
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    assert!(run_all(db.connection()).is_ok(), "Running migrations twice should succeed");
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);

    let folders: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))
        .unwrap();
    assert_eq!(folders, 4, "well-known folders must be seeded exactly once");
}

#[test]
fn test_seeded_folders_carry_remote_ids() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let mut stmt = db
        .connection()
        .prepare("SELECT well_known, remote_folder_id, title FROM folders ORDER BY local_id")
        .unwrap();
    let rows: Vec<(String, Option<String>, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        rows,
        vec![
            ("unread".to_string(), Some("unread".to_string()), "Home".to_string()),
            ("liked".to_string(), Some("starred".to_string()), "Liked".to_string()),
            ("archive".to_string(), Some("archive".to_string()), "Archive".to_string()),
            ("orphaned".to_string(), None, "orphaned".to_string()),
        ]
    );
}

#[test]
fn test_bookmark_requires_existing_folder() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let result = db.connection().execute(
        "INSERT INTO bookmarks (bookmark_id, folder_local_id, title, url) VALUES (1, 9999, 't', 'u')",
        [],
    );
    assert!(result.is_err(), "foreign keys must be enforced");
}

#[test]
fn test_open_file_database_and_remove_files() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("replica.db");
    let location = StoreLocation::File(db_path.clone());

    let db = Database::open_location(&location);
    assert!(db.is_ok(), "open with file path should succeed");
    assert!(db_path.exists(), "Database file should exist on disk");

    drop(db);
    location.remove_files().unwrap();
    assert!(!db_path.exists());
    // Removing again is not an error.
    location.remove_files().unwrap();
}
