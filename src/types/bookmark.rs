use serde::{Deserialize, Serialize};

use super::errors::RemoteError;
use super::folder::FolderLocalId;
use super::remote::RemoteBookmark;

/// Identity of a bookmark, assigned by the remote service.
pub type BookmarkId = i64;

/// Represents a saved article in the local replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub bookmark_id: BookmarkId,
    pub folder_local_id: FolderLocalId,
    pub remote_folder_id: Option<String>,
    pub title: String,
    pub url: String,
    pub hash: Option<String>,
    pub starred: bool,
    /// Read progress in `0.0..=1.0`.
    pub progress: f64,
    pub progress_timestamp: i64,
    pub content_available_locally: bool,
    pub description: Option<String>,
    pub time: Option<i64>,
    /// Where downloaded article content lives; never sent by the service.
    pub local_folder_relative_path: Option<String>,
}

impl Bookmark {
    /// Builds a new local record for a bookmark first seen in a remote listing.
    pub fn from_remote(
        remote: &RemoteBookmark,
        folder_local_id: FolderLocalId,
        remote_folder_id: Option<String>,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            bookmark_id: remote.bookmark_id,
            folder_local_id,
            remote_folder_id,
            title: remote.title.clone(),
            url: remote.url.clone(),
            hash: remote.hash.clone(),
            starred: remote.starred_flag()?,
            progress: remote.progress_value()?,
            progress_timestamp: remote.progress_timestamp,
            content_available_locally: false,
            description: remote.description.clone(),
            time: remote.time,
            local_folder_relative_path: None,
        })
    }

    /// Layers the remote fields over this record. Fields only known locally
    /// (folder placement, content paths) are kept.
    pub fn merge_remote(&mut self, remote: &RemoteBookmark) -> Result<(), RemoteError> {
        let starred = remote.starred_flag()?;
        let progress = remote.progress_value()?;

        self.title = remote.title.clone();
        self.url = remote.url.clone();
        if remote.hash.is_some() {
            self.hash = remote.hash.clone();
        }
        if remote.description.is_some() {
            self.description = remote.description.clone();
        }
        if remote.time.is_some() {
            self.time = remote.time;
        }
        self.starred = starred;
        self.progress = progress;
        self.progress_timestamp = remote.progress_timestamp;
        Ok(())
    }
}
