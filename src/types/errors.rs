use thiserror::Error;

// === StoreError ===

/// Errors raised by the replica store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An operation was invoked before `initialize()` completed.
    #[error("Replica store is not connected")]
    NotConnected,
    /// The underlying store could not be opened or created.
    #[error("Replica store unavailable: {0}")]
    StoreUnavailable(String),
    /// A folder with the same title already exists.
    #[error("Folder with the title '{0}' already present")]
    DuplicateFolderTitle(String),
    /// Bookmark with the given ID was not found.
    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(i64),
    /// A bookmark with the given ID is already stored.
    #[error("Bookmark already exists: {0}")]
    BookmarkExists(i64),
    /// The target folder was not found.
    #[error("Folder not found: {0}")]
    FolderNotFound(i64),
    /// Bookmarks cannot be moved into the given folder.
    #[error("Invalid destination folder: {0}")]
    InvalidDestination(i64),
    /// Well-known folders cannot be renamed or removed.
    #[error("Well-known folder cannot be modified: {0}")]
    WellKnownFolder(i64),
    /// Database operation failed.
    #[error("Replica store database error: {0}")]
    Database(#[from] rusqlite::Error),
}

// === RemoteError ===

/// Errors returned by the remote bookmarking service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// The service answered with a numeric error code.
    #[error("Remote error {code}: {message}")]
    Api { code: u32, message: String },
    /// The request never produced a service answer.
    #[error("Remote transport error: {0}")]
    Transport(String),
    /// The service answered with data that could not be decoded.
    #[error("Malformed remote response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Builds an API error with the given code.
    pub fn api(code: u32, message: impl Into<String>) -> Self {
        RemoteError::Api {
            code,
            message: message.into(),
        }
    }

    /// Returns the numeric service error code, if this is an API error.
    pub fn code(&self) -> Option<u32> {
        match self {
            RemoteError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// === SyncError ===

/// Errors that abort a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A local store operation failed.
    #[error("Sync store error: {0}")]
    Store(#[from] StoreError),
    /// A remote call failed with a non-recoverable error.
    #[error("Sync remote error: {0}")]
    Remote(#[from] RemoteError),
    /// The sync was cancelled cooperatively.
    #[error("Sync cancelled")]
    Cancelled,
    /// Pending edits remained after the phase that should have flushed them.
    #[error("Incomplete sync: {pending} pending {entity} edits remain")]
    IncompleteSync { entity: &'static str, pending: usize },
    /// The service reported a duplicate folder title but listed no such folder.
    #[error("Could not adopt remote folder titled '{0}'")]
    FolderAdoption(String),
    /// A folder without a remote identity had no pending add edit.
    #[error("No pending edit for unsynced folder: {0}")]
    MissingFolderEdit(i64),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
