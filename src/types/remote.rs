//! Shapes exchanged with the remote bookmarking service.
//!
//! These mirror the service's JSON payloads, including its habit of sending
//! numeric fields (`starred`, `progress`, folder ids) as strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::bookmark::BookmarkId;
use super::errors::RemoteError;

/// A folder as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFolder {
    #[serde(deserialize_with = "string_or_number")]
    pub folder_id: String,
    pub title: String,
    #[serde(default)]
    pub position: Option<i64>,
}

/// A bookmark as returned by the remote service.
///
/// `starred` and `progress` keep their wire encoding; use
/// [`RemoteBookmark::starred_flag`] and [`RemoteBookmark::progress_value`]
/// to obtain native values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteBookmark {
    pub bookmark_id: BookmarkId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default = "zero", deserialize_with = "string_or_number")]
    pub starred: String,
    #[serde(default = "zero", deserialize_with = "string_or_number")]
    pub progress: String,
    #[serde(default)]
    pub progress_timestamp: i64,
    #[serde(default)]
    pub time: Option<i64>,
}

impl RemoteBookmark {
    /// Parses the wire `starred` value ("0"/"1") into a flag.
    pub fn starred_flag(&self) -> Result<bool, RemoteError> {
        self.starred
            .trim()
            .parse::<i64>()
            .map(|v| v != 0)
            .map_err(|_| {
                RemoteError::Malformed(format!(
                    "starred value '{}' for bookmark {}",
                    self.starred, self.bookmark_id
                ))
            })
    }

    /// Parses the wire `progress` value into a fraction.
    pub fn progress_value(&self) -> Result<f64, RemoteError> {
        self.progress.trim().parse::<f64>().map_err(|_| {
            RemoteError::Malformed(format!(
                "progress value '{}' for bookmark {}",
                self.progress, self.bookmark_id
            ))
        })
    }
}

/// One entry of a have-list: what the client believes about a bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaveStatus {
    pub id: BookmarkId,
    pub hash: Option<String>,
    pub progress: Option<f64>,
    pub progress_timestamp: Option<i64>,
}

impl HaveStatus {
    /// Have entry carrying only identity and hash, as used for the liked list.
    pub fn hash_only(id: BookmarkId, hash: Option<String>) -> Self {
        Self {
            id,
            hash,
            progress: None,
            progress_timestamp: None,
        }
    }
}

/// Parameters for `bookmarks/list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkListParams {
    pub folder_id: Option<String>,
    pub have: Vec<HaveStatus>,
    pub limit: Option<u32>,
}

/// `meta` element of a `bookmarks/list` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMeta {
    /// Comma separated ids the service no longer places in the listed folder.
    #[serde(default)]
    pub delete_ids: Option<String>,
}

impl ListMeta {
    /// Splits `delete_ids` into bookmark ids.
    pub fn delete_ids(&self) -> Result<Vec<BookmarkId>, RemoteError> {
        let Some(raw) = self.delete_ids.as_deref() else {
            return Ok(Vec::new());
        };

        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<BookmarkId>()
                    .map_err(|_| RemoteError::Malformed(format!("delete id '{}'", s)))
            })
            .collect()
    }
}

/// Result of `bookmarks/list`: only the bookmarks that differ from the
/// supplied have-list, plus ids to drop from the folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkListResult {
    pub bookmarks: Vec<RemoteBookmark>,
    pub meta: ListMeta,
    pub duration_ms: u64,
}

/// Parameters for `bookmarks/add`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkAddParams {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub folder_id: Option<String>,
}

impl BookmarkAddParams {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Parameters for `bookmarks/move`.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkMoveParams {
    pub bookmark_id: BookmarkId,
    pub destination_folder_id: String,
}

/// Parameters for `bookmarks/update_read_progress`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadProgressParams {
    pub bookmark_id: BookmarkId,
    pub progress: f64,
    pub progress_timestamp: i64,
}

fn zero() -> String {
    "0".to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(if b { "1" } else { "0" }.to_string()),
        Value::Null => Ok(zero()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {}",
            other
        ))),
    }
}
