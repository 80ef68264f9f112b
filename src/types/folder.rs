use serde::{Deserialize, Serialize};

/// Local identity of a folder row. Assigned by the replica store.
pub type FolderLocalId = i64;

/// Represents a folder in the local replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub local_id: FolderLocalId,
    /// Absent until the folder has been pushed to the remote service.
    pub remote_folder_id: Option<String>,
    pub title: String,
    pub position: Option<i64>,
    pub local_only: bool,
}

/// The four folders seeded into every replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellKnownFolder {
    Unread,
    Liked,
    Archive,
    Orphaned,
}

impl WellKnownFolder {
    pub const ALL: [WellKnownFolder; 4] = [
        WellKnownFolder::Unread,
        WellKnownFolder::Liked,
        WellKnownFolder::Archive,
        WellKnownFolder::Orphaned,
    ];

    /// The identifier the remote service uses for this folder, if any.
    pub fn remote_id(self) -> Option<&'static str> {
        match self {
            WellKnownFolder::Unread => Some("unread"),
            WellKnownFolder::Liked => Some("starred"),
            WellKnownFolder::Archive => Some("archive"),
            WellKnownFolder::Orphaned => None,
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            WellKnownFolder::Unread => "Home",
            WellKnownFolder::Liked => "Liked",
            WellKnownFolder::Archive => "Archive",
            WellKnownFolder::Orphaned => "orphaned",
        }
    }

    /// Key stored in the `well_known` column of the folders table.
    pub fn as_str(self) -> &'static str {
        match self {
            WellKnownFolder::Unread => "unread",
            WellKnownFolder::Liked => "liked",
            WellKnownFolder::Archive => "archive",
            WellKnownFolder::Orphaned => "orphaned",
        }
    }

    pub fn is_local_only(self) -> bool {
        matches!(self, WellKnownFolder::Orphaned)
    }

    /// Returns true when `remote_folder_id` names one of the remote-visible
    /// well-known folders.
    pub fn is_well_known_remote_id(remote_folder_id: &str) -> bool {
        Self::ALL
            .iter()
            .any(|f| f.remote_id() == Some(remote_folder_id))
    }
}

/// Local ids of the well-known folders, computed once at store initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownFolderIds {
    pub unread: FolderLocalId,
    pub liked: FolderLocalId,
    pub archive: FolderLocalId,
    pub orphaned: FolderLocalId,
}

impl WellKnownFolderIds {
    pub fn get(&self, folder: WellKnownFolder) -> FolderLocalId {
        match folder {
            WellKnownFolder::Unread => self.unread,
            WellKnownFolder::Liked => self.liked,
            WellKnownFolder::Archive => self.archive,
            WellKnownFolder::Orphaned => self.orphaned,
        }
    }

    /// Returns the well-known folder with the given local id, if any.
    pub fn classify(&self, local_id: FolderLocalId) -> Option<WellKnownFolder> {
        WellKnownFolder::ALL
            .into_iter()
            .find(|f| self.get(*f) == local_id)
    }

    pub fn is_default(&self, local_id: FolderLocalId) -> bool {
        self.classify(local_id).is_some()
    }
}
