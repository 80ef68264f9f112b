//! Bookmark operations of the replica store.
//!
//! Bookmarks always live in exactly one real folder. The Liked folder is a
//! view over starred bookmarks and never holds one directly.

use rusqlite::{params, Connection};
use tracing::debug;
use uuid::Uuid;

use super::replica_store::{
    bookmark_by_id, bookmark_edit_ids, folder_by_local_id, insert_bookmark_edit, row_to_bookmark,
    ReplicaStore, BOOKMARK_COLUMNS,
};
use crate::types::bookmark::{Bookmark, BookmarkId};
use crate::types::edits::{BookmarkEdit, BookmarkEditKind, BookmarkEditTag};
use crate::types::errors::StoreError;
use crate::types::events::{BookmarkChange, BookmarkOperation, StoreEvent};
use crate::types::folder::{Folder, FolderLocalId, WellKnownFolderIds};

impl ReplicaStore {
    /// Lists bookmarks. With no folder every bookmark is returned; the Liked
    /// folder yields every starred bookmark.
    pub fn list_bookmarks(&self, folder: Option<FolderLocalId>) -> Result<Vec<Bookmark>, StoreError> {
        self.with_conn(|conn, well_known| {
            let (filter, arg) = match folder {
                Some(id) if id == well_known.liked => ("WHERE starred = 1", None),
                Some(id) => ("WHERE folder_local_id = ?1", Some(id)),
                None => ("", None),
            };
            let sql = format!("SELECT {} FROM bookmarks {} ORDER BY bookmark_id", BOOKMARK_COLUMNS, filter);
            let mut stmt = conn.prepare(&sql)?;
            let rows = match arg {
                Some(id) => stmt.query_map(params![id], row_to_bookmark)?,
                None => stmt.query_map([], row_to_bookmark)?,
            };
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn get_bookmark(&self, bookmark_id: BookmarkId) -> Result<Option<Bookmark>, StoreError> {
        self.with_conn(|conn, _| bookmark_by_id(conn, bookmark_id))
    }

    /// Inserts a bookmark into its folder. No edit is recorded.
    ///
    /// # Errors
    /// Returns [`StoreError::FolderNotFound`] if the folder does not exist,
    /// [`StoreError::InvalidDestination`] for the Liked folder and
    /// [`StoreError::BookmarkExists`] if the id is already present.
    pub fn add_bookmark(&self, bookmark: &Bookmark) -> Result<Bookmark, StoreError> {
        let added = self.with_conn(|conn, well_known| {
            placement_folder(conn, well_known, bookmark.folder_local_id)?;
            if bookmark_by_id(conn, bookmark.bookmark_id)?.is_some() {
                return Err(StoreError::BookmarkExists(bookmark.bookmark_id));
            }
            conn.execute(
                &format!(
                    "INSERT INTO bookmarks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    BOOKMARK_COLUMNS
                ),
                params![
                    bookmark.bookmark_id,
                    bookmark.folder_local_id,
                    bookmark.remote_folder_id,
                    bookmark.title,
                    bookmark.url,
                    bookmark.hash,
                    bookmark.starred,
                    bookmark.progress,
                    bookmark.progress_timestamp,
                    bookmark.content_available_locally,
                    bookmark.description,
                    bookmark.time,
                    bookmark.local_folder_relative_path
                ],
            )?;
            Ok(bookmark.clone())
        })?;

        self.notify_bookmark(BookmarkOperation::Add, &added, None, Some(added.folder_local_id));
        Ok(added)
    }

    /// Records a URL saved while offline. The bookmark itself appears once
    /// the service has created it and a listing returns it.
    pub fn add_pending_url(&self, url: &str, title: Option<&str>) -> Result<BookmarkEdit, StoreError> {
        let edit = self.with_conn(|conn, _| {
            insert_bookmark_edit(
                conn,
                BookmarkEditKind::Add {
                    url: url.to_string(),
                    title: title.map(str::to_string),
                },
            )
        })?;
        debug!(url, edit_id = edit.id, "queued offline add");
        Ok(edit)
    }

    /// Replaces every stored field of a bookmark. No edit is recorded.
    ///
    /// # Errors
    /// Returns [`StoreError::BookmarkNotFound`] if the bookmark does not exist.
    pub fn update_bookmark(&self, bookmark: &Bookmark, notify: bool) -> Result<Bookmark, StoreError> {
        self.with_conn(|conn, well_known| {
            placement_folder(conn, well_known, bookmark.folder_local_id)?;
            let changed = write_bookmark(conn, bookmark)?;
            if changed == 0 {
                return Err(StoreError::BookmarkNotFound(bookmark.bookmark_id));
            }
            Ok(())
        })?;

        if notify {
            self.notify_bookmark(BookmarkOperation::Update, bookmark, None, Some(bookmark.folder_local_id));
        }
        Ok(bookmark.clone())
    }

    /// Deletes a bookmark and every pending edit for it except like/unlike.
    /// A local removal records a delete edit.
    ///
    /// # Errors
    /// Returns [`StoreError::BookmarkNotFound`] if the bookmark does not exist.
    pub fn remove_bookmark(&self, bookmark_id: BookmarkId, from_remote: bool) -> Result<(), StoreError> {
        let source = self.with_conn(|conn, _| {
            let bookmark = bookmark_by_id(conn, bookmark_id)?.ok_or(StoreError::BookmarkNotFound(bookmark_id))?;

            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM bookmarks WHERE bookmark_id = ?1", params![bookmark_id])?;
            tx.execute(
                "DELETE FROM bookmark_edits WHERE bookmark_id = ?1 AND kind NOT IN ('star', 'unstar')",
                params![bookmark_id],
            )?;
            if !from_remote {
                insert_bookmark_edit(
                    &tx,
                    BookmarkEditKind::Delete {
                        bookmark_id,
                        source_folder_local_id: bookmark.folder_local_id,
                    },
                )?;
            }
            tx.commit()?;
            Ok(bookmark.folder_local_id)
        })?;

        self.notify(StoreEvent::Bookmarks(BookmarkChange {
            operation: BookmarkOperation::Delete,
            bookmark_id,
            bookmark: None,
            source_folder_local_id: Some(source),
            destination_folder_local_id: None,
        }));
        Ok(())
    }

    /// Moves a bookmark to another folder. A local move replaces any earlier
    /// pending move for the bookmark.
    ///
    /// # Errors
    /// Returns [`StoreError::BookmarkNotFound`], [`StoreError::FolderNotFound`],
    /// or [`StoreError::InvalidDestination`] when the destination is Liked.
    pub fn move_bookmark(
        &self,
        bookmark_id: BookmarkId,
        destination: FolderLocalId,
        from_remote: bool,
    ) -> Result<Bookmark, StoreError> {
        let (moved, source) = self.with_conn(|conn, well_known| {
            let mut bookmark =
                bookmark_by_id(conn, bookmark_id)?.ok_or(StoreError::BookmarkNotFound(bookmark_id))?;
            let folder = placement_folder(conn, well_known, destination)?;

            let source = bookmark.folder_local_id;
            bookmark.folder_local_id = folder.local_id;
            bookmark.remote_folder_id = folder.remote_folder_id;

            let tx = conn.unchecked_transaction()?;
            write_bookmark(&tx, &bookmark)?;
            if !from_remote {
                tx.execute(
                    "DELETE FROM bookmark_edits WHERE bookmark_id = ?1 AND kind = 'move'",
                    params![bookmark_id],
                )?;
                insert_bookmark_edit(
                    &tx,
                    BookmarkEditKind::Move {
                        bookmark_id,
                        source_folder_local_id: source,
                        destination_folder_local_id: destination,
                    },
                )?;
            }
            tx.commit()?;
            Ok((bookmark, source))
        })?;

        self.notify_bookmark(BookmarkOperation::Move, &moved, Some(source), Some(destination));
        Ok(moved)
    }

    /// Stars a bookmark. A pending unlike is annihilated instead of
    /// recording a like. Starring an already starred bookmark changes nothing.
    ///
    /// Returns `None` when the bookmark is missing and `ignore_missing` is set.
    pub fn like_bookmark(
        &self,
        bookmark_id: BookmarkId,
        record_edit: bool,
        ignore_missing: bool,
    ) -> Result<Option<Bookmark>, StoreError> {
        self.set_starred(bookmark_id, true, record_edit, ignore_missing)
    }

    /// Unstars a bookmark. A pending like is annihilated instead of
    /// recording an unlike.
    pub fn unlike_bookmark(
        &self,
        bookmark_id: BookmarkId,
        record_edit: bool,
        ignore_missing: bool,
    ) -> Result<Option<Bookmark>, StoreError> {
        self.set_starred(bookmark_id, false, record_edit, ignore_missing)
    }

    fn set_starred(
        &self,
        bookmark_id: BookmarkId,
        starred: bool,
        record_edit: bool,
        ignore_missing: bool,
    ) -> Result<Option<Bookmark>, StoreError> {
        let (same, opposite) = if starred {
            (BookmarkEditTag::Like, BookmarkEditTag::Unlike)
        } else {
            (BookmarkEditTag::Unlike, BookmarkEditTag::Like)
        };

        let outcome = self.with_conn(|conn, _| {
            let Some(mut bookmark) = bookmark_by_id(conn, bookmark_id)? else {
                if ignore_missing {
                    return Ok(None);
                }
                return Err(StoreError::BookmarkNotFound(bookmark_id));
            };

            if bookmark.starred == starred {
                return Ok(Some((bookmark, false)));
            }

            let tx = conn.unchecked_transaction()?;
            bookmark.starred = starred;
            write_bookmark(&tx, &bookmark)?;

            if bookmark_edit_ids(&tx, bookmark_id, same)?.is_empty() {
                let opposing = bookmark_edit_ids(&tx, bookmark_id, opposite)?;
                if !opposing.is_empty() {
                    for id in opposing {
                        tx.execute("DELETE FROM bookmark_edits WHERE id = ?1", params![id])?;
                    }
                } else if record_edit {
                    let source_folder_local_id = bookmark.folder_local_id;
                    let kind = if starred {
                        BookmarkEditKind::Like {
                            bookmark_id,
                            source_folder_local_id,
                        }
                    } else {
                        BookmarkEditKind::Unlike {
                            bookmark_id,
                            source_folder_local_id,
                        }
                    };
                    insert_bookmark_edit(&tx, kind)?;
                }
            }

            tx.commit()?;
            Ok(Some((bookmark, true)))
        })?;

        let Some((bookmark, changed)) = outcome else {
            return Ok(None);
        };
        if changed {
            let operation = if starred {
                BookmarkOperation::Like
            } else {
                BookmarkOperation::Unlike
            };
            self.notify_bookmark(operation, &bookmark, None, Some(bookmark.folder_local_id));
        }
        Ok(Some(bookmark))
    }

    /// Records local read progress, stamping the current time and a fresh
    /// random hash so the next listing returns the service's view.
    ///
    /// # Errors
    /// Returns [`StoreError::BookmarkNotFound`] if the bookmark does not exist.
    pub fn update_read_progress(&self, bookmark_id: BookmarkId, progress: f64) -> Result<Bookmark, StoreError> {
        let updated = self.with_conn(|conn, _| {
            let mut bookmark =
                bookmark_by_id(conn, bookmark_id)?.ok_or(StoreError::BookmarkNotFound(bookmark_id))?;
            bookmark.progress = progress.clamp(0.0, 1.0);
            bookmark.progress_timestamp = Self::now();
            bookmark.hash = Some(Uuid::new_v4().to_string());
            write_bookmark(conn, &bookmark)?;
            Ok(bookmark)
        })?;

        self.notify_bookmark(BookmarkOperation::Update, &updated, None, Some(updated.folder_local_id));
        Ok(updated)
    }

    fn notify_bookmark(
        &self,
        operation: BookmarkOperation,
        bookmark: &Bookmark,
        source: Option<FolderLocalId>,
        destination: Option<FolderLocalId>,
    ) {
        self.notify(StoreEvent::Bookmarks(BookmarkChange {
            operation,
            bookmark_id: bookmark.bookmark_id,
            bookmark: Some(bookmark.clone()),
            source_folder_local_id: source,
            destination_folder_local_id: destination,
        }));
    }
}

/// Resolves a folder a bookmark may be placed in.
fn placement_folder(
    conn: &Connection,
    well_known: WellKnownFolderIds,
    local_id: FolderLocalId,
) -> Result<Folder, StoreError> {
    let folder = folder_by_local_id(conn, local_id)?.ok_or(StoreError::FolderNotFound(local_id))?;
    if local_id == well_known.liked {
        return Err(StoreError::InvalidDestination(local_id));
    }
    Ok(folder)
}

fn write_bookmark(conn: &Connection, bookmark: &Bookmark) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE bookmarks SET folder_local_id = ?2, remote_folder_id = ?3, title = ?4, url = ?5, hash = ?6, \
         starred = ?7, progress = ?8, progress_timestamp = ?9, content_available_locally = ?10, \
         description = ?11, time = ?12, local_folder_relative_path = ?13 WHERE bookmark_id = ?1",
        params![
            bookmark.bookmark_id,
            bookmark.folder_local_id,
            bookmark.remote_folder_id,
            bookmark.title,
            bookmark.url,
            bookmark.hash,
            bookmark.starred,
            bookmark.progress,
            bookmark.progress_timestamp,
            bookmark.content_available_locally,
            bookmark.description,
            bookmark.time,
            bookmark.local_folder_relative_path
        ],
    )?)
}
