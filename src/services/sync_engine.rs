//! Reconciliation engine: one `sync()` pushes the pending edit logs to the
//! remote service and pulls the service's state back into the replica.
//!
//! Phases run strictly in order:
//!
//! 1. folder push (pending folder adds and deletes),
//! 2. folder diff against the remote folder list,
//! 3. pending offline bookmark adds,
//! 4. per-folder bookmark sync (moves, deletes, have-list listing),
//! 5. like reconciliation,
//! 6. orphan cleanup,
//! 7. final check that no pending bookmark edits remain.
//!
//! Progress is not transactional across phases: whatever committed before a
//! failure stays committed and the remainder is retried on the next sync.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::managers::replica_store::ReplicaStore;
use crate::services::event_bus::{EventBus, EventStream};
use crate::services::remote::{
    absorb, is_duplicate_folder_title, is_ignorable_move_failure, is_missing_bookmark,
    is_missing_folder, RemoteService,
};
use crate::services::sequencer;
use crate::types::bookmark::Bookmark;
use crate::types::edits::{BookmarkEdit, BookmarkEditKind, EditId, FolderEditKind};
use crate::types::errors::{StoreError, SyncError};
use crate::types::events::SyncStatus;
use crate::types::folder::{Folder, FolderLocalId, WellKnownFolder, WellKnownFolderIds};
use crate::types::remote::{
    BookmarkAddParams, BookmarkListParams, BookmarkMoveParams, HaveStatus, RemoteFolder,
};
use crate::types::settings::SyncSettings;

/// What a single `sync()` call should do.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Run the folder phases (1 and 2).
    pub folders: bool,
    /// Run the bookmark phases (3 to 7).
    pub bookmarks: bool,
    /// Restrict bookmark sync to `folder`. Ignored when `folder` is `None`.
    pub single_folder: bool,
    /// Target of a single-folder sync, otherwise the folder synced first.
    pub folder: Option<FolderLocalId>,
    pub skip_orphan_cleanup: bool,
    pub cancellation: Option<CancellationToken>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            folders: true,
            bookmarks: true,
            single_folder: false,
            folder: None,
            skip_orphan_cleanup: false,
            cancellation: None,
        }
    }
}

impl SyncOptions {
    /// Bookmark sync scoped to one folder.
    pub fn single_folder(folder: FolderLocalId) -> Self {
        Self {
            folders: false,
            single_folder: true,
            folder: Some(folder),
            ..Self::default()
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn scoped_folder(&self) -> Option<FolderLocalId> {
        self.folder.filter(|_| self.single_folder)
    }
}

/// Drives a [`RemoteService`] against a [`ReplicaStore`].
pub struct SyncEngine {
    remote: Arc<dyn RemoteService>,
    settings: SyncSettings,
    status: EventBus<SyncStatus>,
}

impl SyncEngine {
    pub fn new(remote: Arc<dyn RemoteService>, settings: SyncSettings, status: EventBus<SyncStatus>) -> Self {
        Self {
            remote,
            settings,
            status,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Subscribes to sync progress notifications.
    pub fn subscribe(&self) -> EventStream<SyncStatus> {
        self.status.subscribe()
    }

    /// Runs one sync cycle. Callers must not run two cycles against the same
    /// store at once.
    ///
    /// `End` is published whether or not the cycle succeeds.
    ///
    /// # Errors
    /// Returns [`SyncError::Cancelled`] when the token fires,
    /// [`SyncError::IncompleteSync`] when edits survive a cycle, or the first
    /// unrecoverable store or remote error.
    pub async fn sync(&self, store: &ReplicaStore, options: SyncOptions) -> Result<(), SyncError> {
        self.status.publish(SyncStatus::Start);
        info!(
            folders = options.folders,
            bookmarks = options.bookmarks,
            single_folder = ?options.scoped_folder(),
            "sync started"
        );

        let result = self.run(store, &options).await;

        match &result {
            Ok(()) => info!("sync finished"),
            Err(e) => warn!("sync failed: {}", e),
        }
        self.status.publish(SyncStatus::End);
        result
    }

    async fn run(&self, store: &ReplicaStore, options: &SyncOptions) -> Result<(), SyncError> {
        let well_known = store.well_known()?;
        let token = options.cancellation.as_ref();

        if options.folders {
            checkpoint(token)?;
            self.status.publish(SyncStatus::FoldersStart);
            self.sync_folders(store, well_known, token).await?;
            self.status.publish(SyncStatus::FoldersEnd);
        }

        if options.bookmarks {
            checkpoint(token)?;
            self.status.publish(SyncStatus::BookmarksStart);
            self.sync_bookmarks(store, well_known, options).await?;
            self.status.publish(SyncStatus::BookmarksEnd);
        }
        Ok(())
    }

    // === Phases 1 and 2: folders ===

    async fn sync_folders(
        &self,
        store: &ReplicaStore,
        well_known: WellKnownFolderIds,
        token: Option<&CancellationToken>,
    ) -> Result<(), SyncError> {
        for edit in store.pending_folder_edits()? {
            checkpoint(token)?;
            match edit.kind {
                FolderEditKind::Add { folder_local_id, title } => {
                    self.push_folder_add(store, edit.id, folder_local_id, &title).await?;
                }
                FolderEditKind::Delete {
                    removed_remote_folder_id,
                    title,
                } => {
                    if let Some(remote_id) = removed_remote_folder_id {
                        absorb(self.remote.delete_folder(&remote_id).await, is_missing_folder)?;
                    }
                    store.delete_pending_folder_edit(edit.id)?;
                    debug!(title = %title, "pushed folder delete");
                }
            }
        }

        checkpoint(token)?;
        let remote_folders = self.remote.list_folders().await?;
        self.apply_folder_diff(store, well_known, &remote_folders)?;

        let pending = store.pending_folder_edits()?.len();
        if pending > 0 {
            return Err(SyncError::IncompleteSync {
                entity: "folder",
                pending,
            });
        }
        Ok(())
    }

    /// Pushes a pending folder add. A duplicate-title answer adopts the
    /// remote folder that already carries the title.
    async fn push_folder_add(
        &self,
        store: &ReplicaStore,
        edit_id: EditId,
        folder_local_id: FolderLocalId,
        title: &str,
    ) -> Result<(), SyncError> {
        let remote_folder = match self.remote.add_folder(title).await {
            Ok(folder) => folder,
            Err(e) if is_duplicate_folder_title(&e) => {
                debug!(title, "folder already exists remotely, adopting it");
                self.remote
                    .list_folders()
                    .await?
                    .into_iter()
                    .find(|f| f.title == title)
                    .ok_or_else(|| SyncError::FolderAdoption(title.to_string()))?
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(mut folder) = store.get_folder_by_local_id(folder_local_id)? {
            folder.remote_folder_id = Some(remote_folder.folder_id);
            folder.position = remote_folder.position;
            store.update_folder(&folder)?;
        }
        store.delete_pending_folder_edit(edit_id)?;
        Ok(())
    }

    fn apply_folder_diff(
        &self,
        store: &ReplicaStore,
        well_known: WellKnownFolderIds,
        remote_folders: &[RemoteFolder],
    ) -> Result<(), SyncError> {
        let remote_ids: HashSet<&str> = remote_folders.iter().map(|f| f.folder_id.as_str()).collect();
        let local = store.list_folders()?;

        for folder in &local {
            if well_known.is_default(folder.local_id) {
                continue;
            }
            if let Some(remote_id) = folder.remote_folder_id.as_deref() {
                if !remote_ids.contains(remote_id) {
                    debug!(title = %folder.title, "folder deleted remotely");
                    store.remove_folder(folder.local_id, false)?;
                }
            }
        }

        // Renames land before inserts so a new remote folder may take a
        // title another folder just gave up.
        let mut added = Vec::new();
        for remote in remote_folders {
            self.status.publish(SyncStatus::Folder {
                title: remote.title.clone(),
            });

            let existing = local
                .iter()
                .find(|f| f.remote_folder_id.as_deref() == Some(remote.folder_id.as_str()));
            match existing {
                Some(folder) if folder.title != remote.title || folder.position != remote.position => {
                    let mut updated = folder.clone();
                    updated.title = remote.title.clone();
                    updated.position = remote.position;
                    store.update_folder(&updated)?;
                }
                Some(_) => {}
                None => added.push(remote),
            }
        }

        for remote in added {
            store.add_synced_folder(remote)?;
        }
        Ok(())
    }

    // === Phases 3 to 7: bookmarks ===

    async fn sync_bookmarks(
        &self,
        store: &ReplicaStore,
        well_known: WellKnownFolderIds,
        options: &SyncOptions,
    ) -> Result<(), SyncError> {
        let token = options.cancellation.as_ref();
        let scoped = options.scoped_folder();

        let folders = match scoped {
            Some(local_id) => vec![self.prepare_single_folder(store, local_id).await?],
            None => {
                self.push_bookmark_adds(store, token).await?;
                let mut folders = store.list_folders()?;
                if let Some(priority) = options.folder {
                    if let Some(index) = folders.iter().position(|f| f.local_id == priority) {
                        let first = folders.remove(index);
                        folders.insert(0, first);
                    }
                }
                folders
            }
        };

        checkpoint(token)?;
        let remote_ids: HashSet<String> = if options.folders {
            store
                .list_folders()?
                .into_iter()
                .filter_map(|f| f.remote_folder_id)
                .collect()
        } else {
            self.remote
                .list_folders()
                .await?
                .into_iter()
                .map(|f| f.folder_id)
                .collect()
        };

        let syncable: Vec<Folder> = folders
            .into_iter()
            .filter(|f| f.local_id != well_known.liked && f.local_id != well_known.orphaned)
            .filter(|f| match f.remote_folder_id.as_deref() {
                Some(_) if well_known.is_default(f.local_id) => true,
                Some(remote_id) => remote_ids.contains(remote_id),
                None => false,
            })
            .collect();

        if scoped.is_none() {
            let reachable: HashSet<FolderLocalId> = syncable.iter().map(|f| f.local_id).collect();
            self.push_unreachable_deletes(store, &reachable, token).await?;
        }

        // Moves and listings in one folder depend on the folders before it,
        // so folders go strictly one at a time.
        let engine = self;
        sequencer::run(
            syncable,
            move |folder, _| engine.sync_folder_bookmarks(store, folder, well_known, token),
            1,
            token,
        )
        .await?;

        checkpoint(token)?;
        self.sync_likes(store, well_known, token).await?;

        if scoped.is_none() && !options.skip_orphan_cleanup {
            checkpoint(token)?;
            self.clean_orphans(store, well_known)?;
        }

        let pending = store.pending_bookmark_edits(scoped)?.len();
        if pending > 0 {
            return Err(SyncError::IncompleteSync {
                entity: "bookmark",
                pending,
            });
        }
        Ok(())
    }

    /// Resolves the target of a single-folder sync, pushing its pending add
    /// first when it has never reached the service.
    async fn prepare_single_folder(&self, store: &ReplicaStore, local_id: FolderLocalId) -> Result<Folder, SyncError> {
        let folder = store
            .get_folder_by_local_id(local_id)?
            .ok_or(StoreError::FolderNotFound(local_id))?;
        if folder.remote_folder_id.is_some() {
            return Ok(folder);
        }

        let edit = store
            .pending_folder_edits()?
            .into_iter()
            .find(|e| matches!(e.kind, FolderEditKind::Add { folder_local_id, .. } if folder_local_id == local_id))
            .ok_or(SyncError::MissingFolderEdit(local_id))?;
        self.push_folder_add(store, edit.id, local_id, &folder.title).await?;

        Ok(store
            .get_folder_by_local_id(local_id)?
            .ok_or(StoreError::FolderNotFound(local_id))?)
    }

    async fn push_bookmark_adds(&self, store: &ReplicaStore, token: Option<&CancellationToken>) -> Result<(), SyncError> {
        let adds = store.pending_bookmark_adds()?;
        if adds.is_empty() {
            return Ok(());
        }

        debug!(count = adds.len(), "pushing offline adds");
        let engine = self;
        sequencer::run(adds, move |edit, _| engine.push_bookmark_add(store, edit), 1, token).await?;
        Ok(())
    }

    async fn push_bookmark_add(&self, store: &ReplicaStore, edit: BookmarkEdit) -> Result<(), SyncError> {
        if let BookmarkEditKind::Add { url, title } = edit.kind {
            self.remote
                .add_bookmark(BookmarkAddParams {
                    url,
                    title,
                    ..BookmarkAddParams::default()
                })
                .await?;
        }
        store.delete_pending_bookmark_edit(edit.id)?;
        Ok(())
    }

    /// Pushes deletes whose source folder no pass will visit, such as one
    /// removed in the meantime. Deleting needs only the bookmark id.
    async fn push_unreachable_deletes(
        &self,
        store: &ReplicaStore,
        reachable: &HashSet<FolderLocalId>,
        token: Option<&CancellationToken>,
    ) -> Result<(), SyncError> {
        let deletes: Vec<BookmarkEdit> = store
            .pending_bookmark_edits(None)?
            .deletes
            .into_iter()
            .filter(|e| match e.kind {
                BookmarkEditKind::Delete {
                    source_folder_local_id, ..
                } => !reachable.contains(&source_folder_local_id),
                _ => false,
            })
            .collect();
        if !deletes.is_empty() {
            debug!(count = deletes.len(), "pushing deletes outside synced folders");
        }
        for edit in deletes {
            checkpoint(token)?;
            if let Some(bookmark_id) = edit.kind.bookmark_id() {
                absorb(self.remote.delete_bookmark(bookmark_id).await, is_missing_bookmark)?;
            }
            store.delete_pending_bookmark_edit(edit.id)?;
        }
        Ok(())
    }

    async fn sync_folder_bookmarks(
        &self,
        store: &ReplicaStore,
        folder: Folder,
        well_known: WellKnownFolderIds,
        token: Option<&CancellationToken>,
    ) -> Result<(), SyncError> {
        let Some(remote_folder_id) = folder.remote_folder_id.clone() else {
            return Ok(());
        };
        self.status.publish(SyncStatus::BookmarkFolder {
            title: folder.title.clone(),
        });

        let pending = store.pending_bookmark_edits(Some(folder.local_id))?;
        for edit in pending.moves {
            checkpoint(token)?;
            self.push_move(store, well_known, &edit).await?;
            store.delete_pending_bookmark_edit(edit.id)?;
        }
        for edit in pending.deletes {
            checkpoint(token)?;
            if let Some(bookmark_id) = edit.kind.bookmark_id() {
                absorb(self.remote.delete_bookmark(bookmark_id).await, is_missing_bookmark)?;
            }
            store.delete_pending_bookmark_edit(edit.id)?;
        }

        checkpoint(token)?;
        let have: Vec<HaveStatus> = store
            .list_bookmarks(Some(folder.local_id))?
            .into_iter()
            .map(|b| HaveStatus {
                id: b.bookmark_id,
                hash: b.hash,
                progress: Some(b.progress),
                progress_timestamp: Some(b.progress_timestamp),
            })
            .collect();

        let listing = self
            .remote
            .list_bookmarks(BookmarkListParams {
                limit: Some(self.settings.limit_for(&remote_folder_id)),
                folder_id: Some(remote_folder_id.clone()),
                have,
            })
            .await?;
        self.status.publish(SyncStatus::BookmarkListCompleted {
            duration_ms: listing.duration_ms,
        });

        for remote in &listing.bookmarks {
            match store.get_bookmark(remote.bookmark_id)? {
                None => {
                    let bookmark = Bookmark::from_remote(remote, folder.local_id, Some(remote_folder_id.clone()))?;
                    store.add_bookmark(&bookmark)?;
                }
                Some(existing) => {
                    let mut bookmark = if existing.folder_local_id != folder.local_id {
                        store.move_bookmark(existing.bookmark_id, folder.local_id, true)?
                    } else {
                        existing
                    };
                    bookmark.merge_remote(remote)?;
                    store.update_bookmark(&bookmark, true)?;
                }
            }
        }

        for bookmark_id in listing.meta.delete_ids()? {
            match store.get_bookmark(bookmark_id)? {
                Some(b) if b.folder_local_id == folder.local_id => {
                    store.move_bookmark(bookmark_id, well_known.orphaned, true)?;
                }
                _ => {}
            }
        }

        debug!(
            folder = %folder.title,
            returned = listing.bookmarks.len(),
            "folder bookmarks reconciled"
        );
        Ok(())
    }

    /// Pushes one pending move. Archive and Unread are reached through their
    /// own calls since the service does not model them as folders.
    async fn push_move(
        &self,
        store: &ReplicaStore,
        well_known: WellKnownFolderIds,
        edit: &BookmarkEdit,
    ) -> Result<(), SyncError> {
        let BookmarkEditKind::Move {
            bookmark_id,
            destination_folder_local_id,
            ..
        } = edit.kind
        else {
            return Ok(());
        };

        match well_known.classify(destination_folder_local_id) {
            Some(WellKnownFolder::Archive) => {
                absorb(self.remote.archive(bookmark_id).await, is_missing_bookmark)?;
            }
            Some(WellKnownFolder::Unread) => {
                if let Some(bookmark) = store.get_bookmark(bookmark_id)? {
                    absorb(
                        self.remote.add_bookmark(BookmarkAddParams::url(bookmark.url)).await,
                        is_ignorable_move_failure,
                    )?;
                }
            }
            _ => {
                let destination = store
                    .get_folder_by_local_id(destination_folder_local_id)?
                    .and_then(|f| f.remote_folder_id);
                match destination {
                    Some(destination_folder_id) => {
                        absorb(
                            self.remote
                                .move_bookmark(BookmarkMoveParams {
                                    bookmark_id,
                                    destination_folder_id,
                                })
                                .await,
                            is_ignorable_move_failure,
                        )?;
                    }
                    None => debug!(bookmark_id, "move destination gone, dropping edit"),
                }
            }
        }
        Ok(())
    }

    async fn sync_likes(
        &self,
        store: &ReplicaStore,
        well_known: WellKnownFolderIds,
        token: Option<&CancellationToken>,
    ) -> Result<(), SyncError> {
        let pending = store.pending_bookmark_edits(None)?;
        for edit in pending.likes {
            checkpoint(token)?;
            if let Some(bookmark_id) = edit.kind.bookmark_id() {
                absorb(self.remote.star(bookmark_id).await, is_missing_bookmark)?;
            }
            store.delete_pending_bookmark_edit(edit.id)?;
        }
        for edit in pending.unlikes {
            checkpoint(token)?;
            if let Some(bookmark_id) = edit.kind.bookmark_id() {
                absorb(self.remote.unstar(bookmark_id).await, is_missing_bookmark)?;
            }
            store.delete_pending_bookmark_edit(edit.id)?;
        }

        checkpoint(token)?;
        let have: Vec<HaveStatus> = store
            .list_bookmarks(Some(well_known.liked))?
            .into_iter()
            .map(|b| HaveStatus::hash_only(b.bookmark_id, b.hash))
            .collect();

        let liked_id = WellKnownFolder::Liked.remote_id().unwrap_or("starred");
        let listing = self
            .remote
            .list_bookmarks(BookmarkListParams {
                folder_id: Some(liked_id.to_string()),
                have,
                limit: Some(self.settings.limit_for(liked_id)),
            })
            .await?;
        self.status.publish(SyncStatus::BookmarkListCompleted {
            duration_ms: listing.duration_ms,
        });

        for remote in &listing.bookmarks {
            store.like_bookmark(remote.bookmark_id, false, true)?;
        }
        for bookmark_id in listing.meta.delete_ids()? {
            store.unlike_bookmark(bookmark_id, false, true)?;
        }
        Ok(())
    }

    fn clean_orphans(&self, store: &ReplicaStore, well_known: WellKnownFolderIds) -> Result<(), SyncError> {
        let orphans = store.list_bookmarks(Some(well_known.orphaned))?;
        if !orphans.is_empty() {
            debug!(count = orphans.len(), "removing orphaned bookmarks");
        }
        for bookmark in orphans {
            store.remove_bookmark(bookmark.bookmark_id, true)?;
        }
        Ok(())
    }
}

fn checkpoint(token: Option<&CancellationToken>) -> Result<(), SyncError> {
    if token.is_some_and(CancellationToken::is_cancelled) {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}
