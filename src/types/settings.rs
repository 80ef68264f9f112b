use serde::{Deserialize, Serialize};

/// Tunables for the sync engine, persisted as JSON by the settings engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    /// Bookmarks requested per sync for the Unread ("Home") folder.
    pub home_article_limit: u32,
    pub liked_article_limit: u32,
    pub archive_article_limit: u32,
    /// Limit for user folders.
    pub default_article_limit: u32,
    pub event_channel_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            home_article_limit: 250,
            liked_article_limit: 10,
            archive_article_limit: 10,
            default_article_limit: 10,
            event_channel_capacity: 256,
        }
    }
}

impl SyncSettings {
    /// Per-folder bookmark limit, keyed by the remote folder id.
    pub fn limit_for(&self, remote_folder_id: &str) -> u32 {
        match remote_folder_id {
            "unread" => self.home_article_limit,
            "starred" => self.liked_article_limit,
            "archive" => self.archive_article_limit,
            _ => self.default_article_limit,
        }
    }
}
