//! Replica Store for Shelfsync.
//!
//! Holds the local copy of folders and bookmarks plus the two pending-edit
//! logs, backed by SQLite via `rusqlite`. Every mutating operation commits in
//! a single transaction and then raises a [`StoreEvent`].
//!
//! All operations fail with [`StoreError::NotConnected`] until
//! [`ReplicaStore::initialize`] has completed. Bookmark operations live in
//! `bookmark_store.rs`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::database::{Database, StoreLocation};
use crate::services::event_bus::{EventBus, EventStream};
use crate::types::bookmark::{Bookmark, BookmarkId};
use crate::types::edits::{
    BookmarkEdit, BookmarkEditKind, BookmarkEditTag, EditId, FolderEdit, FolderEditKind,
    PendingBookmarkEdits,
};
use crate::types::errors::StoreError;
use crate::types::events::{
    BookmarkChange, BookmarkOperation, FolderChange, FolderOperation, StoreEvent, StoreEventKind,
};
use crate::types::folder::{Folder, FolderLocalId, WellKnownFolder, WellKnownFolderIds};
use crate::types::remote::RemoteFolder;

pub(crate) const FOLDER_COLUMNS: &str = "local_id, remote_folder_id, title, position, local_only";

pub(crate) const BOOKMARK_COLUMNS: &str = "bookmark_id, folder_local_id, remote_folder_id, title, url, hash, \
     starred, progress, progress_timestamp, content_available_locally, description, time, \
     local_folder_relative_path";

const BOOKMARK_EDIT_COLUMNS: &str = "id, kind, bookmark_id, url, title, source_folder_local_id, destination_folder_local_id";

struct Connected {
    db: Database,
    well_known: WellKnownFolderIds,
}

/// Local replica of folders, bookmarks and their pending edits.
pub struct ReplicaStore {
    location: StoreLocation,
    state: Mutex<Option<Connected>>,
    events: EventBus<StoreEvent>,
}

impl ReplicaStore {
    /// Creates a store for `location`. Nothing is opened until
    /// [`initialize`](Self::initialize) is called.
    pub fn new(location: StoreLocation, events: EventBus<StoreEvent>) -> Self {
        Self {
            location,
            state: Mutex::new(None),
            events,
        }
    }

    /// Opens or creates the store, seeding the well-known folders on first
    /// run. Calling it again on a connected store is a no-op.
    ///
    /// # Errors
    /// Returns [`StoreError::StoreUnavailable`] if the database cannot be opened.
    pub fn initialize(&self) -> Result<WellKnownFolderIds, StoreError> {
        let mut guard = self.lock();
        if let Some(connected) = guard.as_ref() {
            return Ok(connected.well_known);
        }

        let db = Database::open_location(&self.location)
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        let well_known = load_well_known(db.connection())?;
        *guard = Some(Connected { db, well_known });

        info!(location = ?self.location, "replica store initialized");
        Ok(well_known)
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Closes the underlying connection. The store may be initialized again.
    pub fn close(&self) {
        if self.lock().take().is_some() {
            debug!(location = ?self.location, "replica store closed");
        }
    }

    /// Closes the store and removes its on-disk data.
    ///
    /// # Errors
    /// Returns [`StoreError::NotConnected`] if the store is not open, or
    /// [`StoreError::StoreUnavailable`] if the files cannot be removed.
    pub fn delete_all_data(&self) -> Result<(), StoreError> {
        if self.lock().take().is_none() {
            return Err(StoreError::NotConnected);
        }
        self.location
            .remove_files()
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        info!(location = ?self.location, "replica store data deleted");
        Ok(())
    }

    /// Local ids of the well-known folders.
    pub fn well_known(&self) -> Result<WellKnownFolderIds, StoreError> {
        self.with_conn(|_, well_known| Ok(well_known))
    }

    /// Subscribes to change notifications of one kind.
    pub fn subscribe(&self, kind: StoreEventKind) -> EventStream<StoreEvent> {
        self.events.subscribe_where(move |event| event.kind() == kind)
    }

    pub fn events(&self) -> &EventBus<StoreEvent> {
        &self.events
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connected>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the open connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection, WellKnownFolderIds) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let guard = self.lock();
        let connected = guard.as_ref().ok_or(StoreError::NotConnected)?;
        f(connected.db.connection(), connected.well_known)
    }

    pub(crate) fn notify(&self, event: StoreEvent) {
        self.events.publish(event);
    }

    /// Returns the current UNIX timestamp in seconds.
    pub(crate) fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    // === Folders ===

    /// Returns a snapshot of every folder, well-known ones included.
    pub fn list_folders(&self) -> Result<Vec<Folder>, StoreError> {
        self.with_conn(|conn, _| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM folders ORDER BY local_id",
                FOLDER_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_folder)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn get_folder_by_local_id(&self, local_id: FolderLocalId) -> Result<Option<Folder>, StoreError> {
        self.with_conn(|conn, _| folder_by_local_id(conn, local_id))
    }

    pub fn get_folder_by_remote_id(&self, remote_folder_id: &str) -> Result<Option<Folder>, StoreError> {
        self.with_conn(|conn, _| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM folders WHERE remote_folder_id = ?1 ORDER BY local_id LIMIT 1",
                        FOLDER_COLUMNS
                    ),
                    params![remote_folder_id],
                    row_to_folder,
                )
                .optional()?)
        })
    }

    /// Adds a user folder.
    ///
    /// When a pending delete exists for the same title, the folder takes back
    /// its former remote identity and the delete is dropped instead of
    /// recording a new add.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateFolderTitle`] if a folder already has this title.
    pub fn add_folder(&self, title: &str, record_edit: bool) -> Result<Folder, StoreError> {
        let folder = self.with_conn(|conn, _| {
            let tx = conn.unchecked_transaction()?;
            ensure_title_free(&tx, title)?;

            let pending_delete: Option<(EditId, Option<String>)> = tx
                .query_row(
                    "SELECT id, removed_remote_folder_id FROM folder_edits \
                     WHERE kind = 'delete' AND title = ?1 ORDER BY id LIMIT 1",
                    params![title],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let folder = match pending_delete {
                Some((edit_id, Some(remote_id))) => {
                    tx.execute("DELETE FROM folder_edits WHERE id = ?1", params![edit_id])?;
                    debug!(title, remote_id = %remote_id, "resurrecting folder from pending delete");
                    insert_folder(&tx, title, Some(&remote_id), None)?
                }
                Some((edit_id, None)) => {
                    tx.execute("DELETE FROM folder_edits WHERE id = ?1", params![edit_id])?;
                    insert_local_folder(&tx, title, record_edit)?
                }
                None => insert_local_folder(&tx, title, record_edit)?,
            };

            tx.commit()?;
            Ok(folder)
        })?;

        self.notify_folder(FolderOperation::Add, &folder);
        Ok(folder)
    }

    /// Adds a folder that already exists remotely. No edit is recorded.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateFolderTitle`] if a folder already has this title.
    pub fn add_synced_folder(&self, remote: &RemoteFolder) -> Result<Folder, StoreError> {
        let folder = self.with_conn(|conn, _| {
            let tx = conn.unchecked_transaction()?;
            ensure_title_free(&tx, &remote.title)?;
            let folder = insert_folder(&tx, &remote.title, Some(&remote.folder_id), remote.position)?;
            tx.commit()?;
            Ok(folder)
        })?;

        self.notify_folder(FolderOperation::Add, &folder);
        Ok(folder)
    }

    /// Replaces a folder's stored fields. Bookmarks in the folder pick up its
    /// remote id.
    ///
    /// # Errors
    /// Returns [`StoreError::FolderNotFound`] for an unknown folder and
    /// [`StoreError::WellKnownFolder`] when renaming a well-known folder.
    pub fn update_folder(&self, folder: &Folder) -> Result<Folder, StoreError> {
        let updated = self.with_conn(|conn, well_known| {
            let existing = folder_by_local_id(conn, folder.local_id)?
                .ok_or(StoreError::FolderNotFound(folder.local_id))?;
            if well_known.is_default(folder.local_id) && existing.title != folder.title {
                return Err(StoreError::WellKnownFolder(folder.local_id));
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "UPDATE folders SET remote_folder_id = ?1, title = ?2, position = ?3, local_only = ?4 \
                 WHERE local_id = ?5",
                params![
                    folder.remote_folder_id,
                    folder.title,
                    folder.position,
                    folder.local_only,
                    folder.local_id
                ],
            )?;
            tx.execute(
                "UPDATE bookmarks SET remote_folder_id = ?1 WHERE folder_local_id = ?2",
                params![folder.remote_folder_id, folder.local_id],
            )?;
            tx.commit()?;
            Ok(folder.clone())
        })?;

        self.notify_folder(FolderOperation::Update, &updated);
        Ok(updated)
    }

    /// Removes a user folder. Its bookmarks are parked in Orphaned.
    ///
    /// A folder whose add never reached the service just loses its pending
    /// add. Otherwise, when `record_edit` is set, a delete edit capturing the
    /// folder's remote id and title is recorded.
    ///
    /// # Errors
    /// Returns [`StoreError::FolderNotFound`] for an unknown folder and
    /// [`StoreError::WellKnownFolder`] for a well-known one.
    pub fn remove_folder(&self, local_id: FolderLocalId, record_edit: bool) -> Result<(), StoreError> {
        let parked = self.with_conn(|conn, well_known| {
            if well_known.is_default(local_id) {
                return Err(StoreError::WellKnownFolder(local_id));
            }
            let folder = folder_by_local_id(conn, local_id)?.ok_or(StoreError::FolderNotFound(local_id))?;

            let tx = conn.unchecked_transaction()?;
            let parked = bookmarks_in_folder(&tx, local_id)?;
            tx.execute(
                "UPDATE bookmarks SET folder_local_id = ?1, remote_folder_id = NULL WHERE folder_local_id = ?2",
                params![well_known.orphaned, local_id],
            )?;
            tx.execute("DELETE FROM folders WHERE local_id = ?1", params![local_id])?;

            // Pending bookmark edits follow their bookmarks into Orphaned. A
            // move into the removed folder can no longer happen.
            tx.execute(
                "DELETE FROM bookmark_edits WHERE kind = 'move' AND destination_folder_local_id = ?1",
                params![local_id],
            )?;
            tx.execute(
                "UPDATE bookmark_edits SET source_folder_local_id = ?1 WHERE source_folder_local_id = ?2",
                params![well_known.orphaned, local_id],
            )?;

            let discarded_adds = tx.execute(
                "DELETE FROM folder_edits WHERE kind = 'add' AND folder_local_id = ?1",
                params![local_id],
            )?;

            if record_edit && discarded_adds == 0 {
                if let Some(remote_id) = &folder.remote_folder_id {
                    tx.execute(
                        "INSERT INTO folder_edits (kind, folder_local_id, removed_remote_folder_id, title) \
                         VALUES ('delete', NULL, ?1, ?2)",
                        params![remote_id, folder.title],
                    )?;
                }
            }

            tx.commit()?;
            Ok(parked
                .into_iter()
                .map(|mut b| {
                    b.folder_local_id = well_known.orphaned;
                    b.remote_folder_id = None;
                    b
                })
                .collect::<Vec<Bookmark>>())
        })?;

        self.notify(StoreEvent::Folders(FolderChange {
            operation: FolderOperation::Delete,
            folder_local_id: local_id,
            folder: None,
        }));
        for bookmark in parked {
            self.notify(StoreEvent::Bookmarks(BookmarkChange {
                operation: BookmarkOperation::Move,
                bookmark_id: bookmark.bookmark_id,
                source_folder_local_id: Some(local_id),
                destination_folder_local_id: Some(bookmark.folder_local_id),
                bookmark: Some(bookmark),
            }));
        }
        Ok(())
    }

    fn notify_folder(&self, operation: FolderOperation, folder: &Folder) {
        self.notify(StoreEvent::Folders(FolderChange {
            operation,
            folder_local_id: folder.local_id,
            folder: Some(folder.clone()),
        }));
    }

    // === Edit logs ===

    /// Pending folder edits in log order.
    pub fn pending_folder_edits(&self) -> Result<Vec<FolderEdit>, StoreError> {
        self.with_conn(|conn, _| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, folder_local_id, removed_remote_folder_id, title FROM folder_edits ORDER BY id",
            )?;
            let rows = stmt.query_map([], row_to_folder_edit)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn delete_pending_folder_edit(&self, id: EditId) -> Result<(), StoreError> {
        self.with_conn(|conn, _| {
            conn.execute("DELETE FROM folder_edits WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    /// Pending bookmark edits grouped by kind. With a folder, only edits whose
    /// source or destination is that folder are returned.
    pub fn pending_bookmark_edits(&self, folder: Option<FolderLocalId>) -> Result<PendingBookmarkEdits, StoreError> {
        self.with_conn(|conn, _| {
            let edits = match folder {
                Some(local_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM bookmark_edits \
                         WHERE source_folder_local_id = ?1 OR destination_folder_local_id = ?1 ORDER BY id",
                        BOOKMARK_EDIT_COLUMNS
                    ))?;
                    let rows = stmt.query_map(params![local_id], row_to_bookmark_edit)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM bookmark_edits ORDER BY id",
                        BOOKMARK_EDIT_COLUMNS
                    ))?;
                    let rows = stmt.query_map([], row_to_bookmark_edit)?;
                    rows.collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(PendingBookmarkEdits::from_edits(edits))
        })
    }

    /// Pending offline adds, in submission order.
    pub fn pending_bookmark_adds(&self) -> Result<Vec<BookmarkEdit>, StoreError> {
        Ok(self.pending_bookmark_edits(None)?.adds)
    }

    pub fn delete_pending_bookmark_edit(&self, id: EditId) -> Result<(), StoreError> {
        self.with_conn(|conn, _| {
            conn.execute("DELETE FROM bookmark_edits WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

fn load_well_known(conn: &Connection) -> Result<WellKnownFolderIds, StoreError> {
    let lookup = |folder: WellKnownFolder| -> Result<FolderLocalId, StoreError> {
        conn.query_row(
            "SELECT local_id FROM folders WHERE well_known = ?1",
            params![folder.as_str()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::StoreUnavailable(format!("well-known folder '{}' missing", folder.as_str())))
    };

    Ok(WellKnownFolderIds {
        unread: lookup(WellKnownFolder::Unread)?,
        liked: lookup(WellKnownFolder::Liked)?,
        archive: lookup(WellKnownFolder::Archive)?,
        orphaned: lookup(WellKnownFolder::Orphaned)?,
    })
}

fn ensure_title_free(conn: &Connection, title: &str) -> Result<(), StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM folders WHERE title = ?1",
        params![title],
        |row| row.get(0),
    )?;
    if count > 0 {
        return Err(StoreError::DuplicateFolderTitle(title.to_string()));
    }
    Ok(())
}

fn insert_folder(
    conn: &Connection,
    title: &str,
    remote_folder_id: Option<&str>,
    position: Option<i64>,
) -> Result<Folder, StoreError> {
    conn.execute(
        "INSERT INTO folders (remote_folder_id, title, position, local_only) VALUES (?1, ?2, ?3, 0)",
        params![remote_folder_id, title, position],
    )?;
    Ok(Folder {
        local_id: conn.last_insert_rowid(),
        remote_folder_id: remote_folder_id.map(str::to_string),
        title: title.to_string(),
        position,
        local_only: false,
    })
}

fn insert_local_folder(conn: &Connection, title: &str, record_edit: bool) -> Result<Folder, StoreError> {
    let folder = insert_folder(conn, title, None, None)?;
    if record_edit {
        conn.execute(
            "INSERT INTO folder_edits (kind, folder_local_id, removed_remote_folder_id, title) \
             VALUES ('add', ?1, NULL, ?2)",
            params![folder.local_id, title],
        )?;
    }
    Ok(folder)
}

pub(crate) fn folder_by_local_id(conn: &Connection, local_id: FolderLocalId) -> Result<Option<Folder>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM folders WHERE local_id = ?1", FOLDER_COLUMNS),
            params![local_id],
            row_to_folder,
        )
        .optional()?)
}

pub(crate) fn bookmark_by_id(conn: &Connection, bookmark_id: BookmarkId) -> Result<Option<Bookmark>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM bookmarks WHERE bookmark_id = ?1", BOOKMARK_COLUMNS),
            params![bookmark_id],
            row_to_bookmark,
        )
        .optional()?)
}

pub(crate) fn bookmarks_in_folder(conn: &Connection, local_id: FolderLocalId) -> Result<Vec<Bookmark>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bookmarks WHERE folder_local_id = ?1 ORDER BY bookmark_id",
        BOOKMARK_COLUMNS
    ))?;
    let rows = stmt.query_map(params![local_id], row_to_bookmark)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Inserts a bookmark edit row and returns it with its assigned id.
pub(crate) fn insert_bookmark_edit(conn: &Connection, kind: BookmarkEditKind) -> Result<BookmarkEdit, StoreError> {
    let tag = kind.tag().as_str();
    match &kind {
        BookmarkEditKind::Add { url, title } => conn.execute(
            "INSERT INTO bookmark_edits (kind, url, title) VALUES (?1, ?2, ?3)",
            params![tag, url, title],
        )?,
        BookmarkEditKind::Delete {
            bookmark_id,
            source_folder_local_id,
        }
        | BookmarkEditKind::Like {
            bookmark_id,
            source_folder_local_id,
        }
        | BookmarkEditKind::Unlike {
            bookmark_id,
            source_folder_local_id,
        } => conn.execute(
            "INSERT INTO bookmark_edits (kind, bookmark_id, source_folder_local_id) VALUES (?1, ?2, ?3)",
            params![tag, bookmark_id, source_folder_local_id],
        )?,
        BookmarkEditKind::Move {
            bookmark_id,
            source_folder_local_id,
            destination_folder_local_id,
        } => conn.execute(
            "INSERT INTO bookmark_edits (kind, bookmark_id, source_folder_local_id, destination_folder_local_id) \
             VALUES (?1, ?2, ?3, ?4)",
            params![tag, bookmark_id, source_folder_local_id, destination_folder_local_id],
        )?,
    };

    Ok(BookmarkEdit {
        id: conn.last_insert_rowid(),
        kind,
    })
}

/// Ids of the pending edits of one kind for a bookmark.
pub(crate) fn bookmark_edit_ids(
    conn: &Connection,
    bookmark_id: BookmarkId,
    tag: BookmarkEditTag,
) -> Result<Vec<EditId>, StoreError> {
    let mut stmt = conn.prepare("SELECT id FROM bookmark_edits WHERE bookmark_id = ?1 AND kind = ?2 ORDER BY id")?;
    let rows = stmt.query_map(params![bookmark_id, tag.as_str()], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn unknown_kind(column: usize, kind: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unknown edit kind '{}'", kind).into(),
    )
}

pub(crate) fn row_to_folder(row: &Row) -> rusqlite::Result<Folder> {
    Ok(Folder {
        local_id: row.get(0)?,
        remote_folder_id: row.get(1)?,
        title: row.get(2)?,
        position: row.get(3)?,
        local_only: row.get(4)?,
    })
}

pub(crate) fn row_to_bookmark(row: &Row) -> rusqlite::Result<Bookmark> {
    Ok(Bookmark {
        bookmark_id: row.get(0)?,
        folder_local_id: row.get(1)?,
        remote_folder_id: row.get(2)?,
        title: row.get(3)?,
        url: row.get(4)?,
        hash: row.get(5)?,
        starred: row.get(6)?,
        progress: row.get(7)?,
        progress_timestamp: row.get(8)?,
        content_available_locally: row.get(9)?,
        description: row.get(10)?,
        time: row.get(11)?,
        local_folder_relative_path: row.get(12)?,
    })
}

fn row_to_folder_edit(row: &Row) -> rusqlite::Result<FolderEdit> {
    let kind: String = row.get(1)?;
    let title: String = row.get(4)?;
    let kind = match kind.as_str() {
        "add" => FolderEditKind::Add {
            folder_local_id: row.get(2)?,
            title,
        },
        "delete" => FolderEditKind::Delete {
            removed_remote_folder_id: row.get(3)?,
            title,
        },
        other => return Err(unknown_kind(1, other)),
    };
    Ok(FolderEdit { id: row.get(0)?, kind })
}

fn row_to_bookmark_edit(row: &Row) -> rusqlite::Result<BookmarkEdit> {
    let raw_kind: String = row.get(1)?;
    let tag = BookmarkEditTag::parse(&raw_kind).ok_or_else(|| unknown_kind(1, &raw_kind))?;
    let kind = match tag {
        BookmarkEditTag::Add => BookmarkEditKind::Add {
            url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            title: row.get(4)?,
        },
        BookmarkEditTag::Delete => BookmarkEditKind::Delete {
            bookmark_id: row.get(2)?,
            source_folder_local_id: row.get(5)?,
        },
        BookmarkEditTag::Move => BookmarkEditKind::Move {
            bookmark_id: row.get(2)?,
            source_folder_local_id: row.get(5)?,
            destination_folder_local_id: row.get(6)?,
        },
        BookmarkEditTag::Like => BookmarkEditKind::Like {
            bookmark_id: row.get(2)?,
            source_folder_local_id: row.get(5)?,
        },
        BookmarkEditTag::Unlike => BookmarkEditKind::Unlike {
            bookmark_id: row.get(2)?,
            source_folder_local_id: row.get(5)?,
        },
    };
    Ok(BookmarkEdit { id: row.get(0)?, kind })
}
