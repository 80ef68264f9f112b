//! Pending edit log entries.
//!
//! Every local mutation that still has to reach the remote service is kept
//! as one row, keyed by an auto-increment id. Rows are removed once a remote
//! call embodying them succeeds or they are found to be moot.

use serde::{Deserialize, Serialize};

use super::bookmark::BookmarkId;
use super::folder::FolderLocalId;

/// Auto-increment id of an edit log row.
pub type EditId = i64;

/// A pending folder edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderEdit {
    pub id: EditId,
    pub kind: FolderEditKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FolderEditKind {
    Add {
        folder_local_id: FolderLocalId,
        title: String,
    },
    /// Captured at deletion time, since the folder row is gone afterwards.
    Delete {
        removed_remote_folder_id: Option<String>,
        title: String,
    },
}

impl FolderEditKind {
    pub fn tag(&self) -> &'static str {
        match self {
            FolderEditKind::Add { .. } => "add",
            FolderEditKind::Delete { .. } => "delete",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            FolderEditKind::Add { title, .. } | FolderEditKind::Delete { title, .. } => title,
        }
    }
}

/// A pending bookmark edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkEdit {
    pub id: EditId,
    pub kind: BookmarkEditKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BookmarkEditKind {
    /// A URL saved offline; it has no bookmark id until the service creates it.
    Add { url: String, title: Option<String> },
    Delete {
        bookmark_id: BookmarkId,
        source_folder_local_id: FolderLocalId,
    },
    Move {
        bookmark_id: BookmarkId,
        source_folder_local_id: FolderLocalId,
        destination_folder_local_id: FolderLocalId,
    },
    Like {
        bookmark_id: BookmarkId,
        source_folder_local_id: FolderLocalId,
    },
    Unlike {
        bookmark_id: BookmarkId,
        source_folder_local_id: FolderLocalId,
    },
}

/// Discriminant of [`BookmarkEditKind`], used for storage and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookmarkEditTag {
    Add,
    Delete,
    Move,
    Like,
    Unlike,
}

impl BookmarkEditTag {
    pub fn as_str(self) -> &'static str {
        match self {
            BookmarkEditTag::Add => "add",
            BookmarkEditTag::Delete => "delete",
            BookmarkEditTag::Move => "move",
            BookmarkEditTag::Like => "star",
            BookmarkEditTag::Unlike => "unstar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(BookmarkEditTag::Add),
            "delete" => Some(BookmarkEditTag::Delete),
            "move" => Some(BookmarkEditTag::Move),
            "star" => Some(BookmarkEditTag::Like),
            "unstar" => Some(BookmarkEditTag::Unlike),
            _ => None,
        }
    }
}

impl BookmarkEditKind {
    pub fn tag(&self) -> BookmarkEditTag {
        match self {
            BookmarkEditKind::Add { .. } => BookmarkEditTag::Add,
            BookmarkEditKind::Delete { .. } => BookmarkEditTag::Delete,
            BookmarkEditKind::Move { .. } => BookmarkEditTag::Move,
            BookmarkEditKind::Like { .. } => BookmarkEditTag::Like,
            BookmarkEditKind::Unlike { .. } => BookmarkEditTag::Unlike,
        }
    }

    /// The bookmark this edit concerns; `None` for offline adds.
    pub fn bookmark_id(&self) -> Option<BookmarkId> {
        match self {
            BookmarkEditKind::Add { .. } => None,
            BookmarkEditKind::Delete { bookmark_id, .. }
            | BookmarkEditKind::Move { bookmark_id, .. }
            | BookmarkEditKind::Like { bookmark_id, .. }
            | BookmarkEditKind::Unlike { bookmark_id, .. } => Some(*bookmark_id),
        }
    }
}

/// Pending bookmark edits grouped by kind, in log order within each group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBookmarkEdits {
    pub adds: Vec<BookmarkEdit>,
    pub deletes: Vec<BookmarkEdit>,
    pub moves: Vec<BookmarkEdit>,
    pub likes: Vec<BookmarkEdit>,
    pub unlikes: Vec<BookmarkEdit>,
}

impl PendingBookmarkEdits {
    pub fn from_edits(edits: Vec<BookmarkEdit>) -> Self {
        let mut grouped = Self::default();
        for edit in edits {
            match edit.kind.tag() {
                BookmarkEditTag::Add => grouped.adds.push(edit),
                BookmarkEditTag::Delete => grouped.deletes.push(edit),
                BookmarkEditTag::Move => grouped.moves.push(edit),
                BookmarkEditTag::Like => grouped.likes.push(edit),
                BookmarkEditTag::Unlike => grouped.unlikes.push(edit),
            }
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.adds.len()
            + self.deletes.len()
            + self.moves.len()
            + self.likes.len()
            + self.unlikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
