//! The remote bookmarking service as seen by the sync engine.
//!
//! The HTTP/OAuth transport lives outside this crate; anything implementing
//! [`RemoteService`] can drive a sync. The error-code vocabulary and the
//! predicates deciding which failures count as "already satisfied" live here
//! so they can be tested without a sync around them.

use async_trait::async_trait;

use crate::types::bookmark::BookmarkId;
use crate::types::errors::RemoteError;
use crate::types::remote::{
    BookmarkAddParams, BookmarkListParams, BookmarkListResult, BookmarkMoveParams,
    ReadProgressParams, RemoteBookmark, RemoteFolder,
};

/// Numeric error codes returned by the service.
pub mod codes {
    /// Invalid or missing bookmark id.
    pub const BOOKMARK_NOT_FOUND: u32 = 1241;
    /// Invalid or missing folder id.
    pub const FOLDER_NOT_FOUND: u32 = 1242;
    /// Unexpected error while deleting a folder; the folder is gone.
    pub const FOLDER_DELETE_FAILED: u32 = 1250;
    /// The user already has a folder with this title.
    pub const DUPLICATE_FOLDER_TITLE: u32 = 1251;
    /// Generic failure while moving a bookmark.
    pub const MOVE_FAILED: u32 = 1500;
}

/// Typed operations offered by the remote service.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn list_folders(&self) -> Result<Vec<RemoteFolder>, RemoteError>;
    async fn add_folder(&self, title: &str) -> Result<RemoteFolder, RemoteError>;
    async fn delete_folder(&self, remote_folder_id: &str) -> Result<(), RemoteError>;

    async fn list_bookmarks(&self, params: BookmarkListParams) -> Result<BookmarkListResult, RemoteError>;
    async fn add_bookmark(&self, params: BookmarkAddParams) -> Result<RemoteBookmark, RemoteError>;
    async fn delete_bookmark(&self, bookmark_id: BookmarkId) -> Result<(), RemoteError>;
    async fn move_bookmark(&self, params: BookmarkMoveParams) -> Result<RemoteBookmark, RemoteError>;
    async fn star(&self, bookmark_id: BookmarkId) -> Result<RemoteBookmark, RemoteError>;
    async fn unstar(&self, bookmark_id: BookmarkId) -> Result<RemoteBookmark, RemoteError>;
    async fn archive(&self, bookmark_id: BookmarkId) -> Result<RemoteBookmark, RemoteError>;
    async fn unarchive(&self, bookmark_id: BookmarkId) -> Result<RemoteBookmark, RemoteError>;
    async fn update_read_progress(&self, params: ReadProgressParams) -> Result<RemoteBookmark, RemoteError>;
}

/// The bookmark no longer exists remotely. Ignorable on delete, star,
/// unstar, archive and move.
pub fn is_missing_bookmark(err: &RemoteError) -> bool {
    err.code() == Some(codes::BOOKMARK_NOT_FOUND)
}

/// The folder no longer exists remotely. Ignorable when deleting a folder.
pub fn is_missing_folder(err: &RemoteError) -> bool {
    matches!(
        err.code(),
        Some(codes::FOLDER_NOT_FOUND) | Some(codes::FOLDER_DELETE_FAILED)
    )
}

/// A folder with the requested title already exists remotely; triggers the
/// adopt-existing flow.
pub fn is_duplicate_folder_title(err: &RemoteError) -> bool {
    err.code() == Some(codes::DUPLICATE_FOLDER_TITLE)
}

/// Failures a pending move treats as done: missing bookmark, missing
/// destination folder, or the service's generic move failure.
pub fn is_ignorable_move_failure(err: &RemoteError) -> bool {
    matches!(
        err.code(),
        Some(codes::BOOKMARK_NOT_FOUND) | Some(codes::FOLDER_NOT_FOUND) | Some(codes::MOVE_FAILED)
    )
}

/// Absorbs an error matched by `recoverable`, propagating anything else.
pub fn absorb<T>(
    result: Result<T, RemoteError>,
    recoverable: fn(&RemoteError) -> bool,
) -> Result<Option<T>, RemoteError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if recoverable(&e) => {
            tracing::debug!("absorbed recoverable remote error: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
