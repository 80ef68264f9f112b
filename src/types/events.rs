use serde::{Deserialize, Serialize};

use super::bookmark::{Bookmark, BookmarkId};
use super::folder::{Folder, FolderLocalId};

/// What happened to a folder row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderOperation {
    Add,
    Update,
    Delete,
}

/// What happened to a bookmark row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookmarkOperation {
    Add,
    Update,
    Delete,
    Move,
    Like,
    Unlike,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderChange {
    pub operation: FolderOperation,
    pub folder_local_id: FolderLocalId,
    /// The folder after the change; absent for deletes.
    pub folder: Option<Folder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkChange {
    pub operation: BookmarkOperation,
    pub bookmark_id: BookmarkId,
    /// The bookmark after the change; absent for deletes.
    pub bookmark: Option<Bookmark>,
    pub source_folder_local_id: Option<FolderLocalId>,
    pub destination_folder_local_id: Option<FolderLocalId>,
}

/// Change notification raised by the replica store after a write commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreEvent {
    Folders(FolderChange),
    Bookmarks(BookmarkChange),
}

/// Selector for [`StoreEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    Folders,
    Bookmarks,
}

impl StoreEvent {
    pub fn kind(&self) -> StoreEventKind {
        match self {
            StoreEvent::Folders(_) => StoreEventKind::Folders,
            StoreEvent::Bookmarks(_) => StoreEventKind::Bookmarks,
        }
    }
}

/// Progress notification raised by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Start,
    End,
    FoldersStart,
    FoldersEnd,
    BookmarksStart,
    BookmarksEnd,
    /// A remote folder was examined during folder reconciliation.
    Folder { title: String },
    /// Bookmarks of a folder are about to be reconciled.
    BookmarkFolder { title: String },
    BookmarkListCompleted { duration_ms: u64 },
}
