//! Unit tests for bookmark operations on the replica store and the pending
//! edits they leave behind.

use futures::StreamExt;

use shelfsync::database::StoreLocation;
use shelfsync::managers::ReplicaStore;
use shelfsync::services::event_bus::EventBus;
use shelfsync::types::bookmark::Bookmark;
use shelfsync::types::edits::BookmarkEditKind;
use shelfsync::types::errors::StoreError;
use shelfsync::types::events::{BookmarkOperation, StoreEvent, StoreEventKind};
use shelfsync::types::folder::WellKnownFolderIds;

fn store() -> (ReplicaStore, WellKnownFolderIds) {
    let store = ReplicaStore::new(StoreLocation::InMemory, EventBus::new(64));
    let ids = store.initialize().expect("initialize failed");
    (store, ids)
}

fn bookmark(id: i64, folder_local_id: i64) -> Bookmark {
    Bookmark {
        bookmark_id: id,
        folder_local_id,
        remote_folder_id: None,
        title: format!("Article {}", id),
        url: format!("https://example.com/{}", id),
        hash: Some(format!("hash-{}", id)),
        starred: false,
        progress: 0.0,
        progress_timestamp: 0,
        content_available_locally: false,
        description: None,
        time: None,
        local_folder_relative_path: None,
    }
}

#[test]
fn test_add_and_get_bookmark() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();

    let fetched = store.get_bookmark(1).unwrap().unwrap();
    assert_eq!(fetched, bookmark(1, ids.unread));
    assert!(store.get_bookmark(2).unwrap().is_none());
    assert!(store.pending_bookmark_edits(None).unwrap().is_empty());
}

#[test]
fn test_add_bookmark_rejects_duplicates_and_bad_folders() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();

    assert!(matches!(store.add_bookmark(&bookmark(1, ids.archive)), Err(StoreError::BookmarkExists(1))));
    assert!(matches!(store.add_bookmark(&bookmark(2, 9999)), Err(StoreError::FolderNotFound(9999))));
    assert!(matches!(
        store.add_bookmark(&bookmark(3, ids.liked)),
        Err(StoreError::InvalidDestination(_))
    ));
}

#[test]
fn test_liked_listing_spans_folders() {
    let (store, ids) = store();
    let reading = store.add_folder("Reading", false).unwrap();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();
    store.add_bookmark(&bookmark(2, reading.local_id)).unwrap();
    store.add_bookmark(&bookmark(3, ids.archive)).unwrap();
    store.like_bookmark(1, true, false).unwrap();
    store.like_bookmark(2, true, false).unwrap();

    let liked: Vec<i64> = store
        .list_bookmarks(Some(ids.liked))
        .unwrap()
        .into_iter()
        .map(|b| b.bookmark_id)
        .collect();
    assert_eq!(liked, vec![1, 2]);
    assert_eq!(store.list_bookmarks(None).unwrap().len(), 3);
    assert_eq!(store.list_bookmarks(Some(reading.local_id)).unwrap().len(), 1);
}

#[test]
fn test_remove_bookmark_records_delete() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();
    store.remove_bookmark(1, false).unwrap();

    assert!(store.get_bookmark(1).unwrap().is_none());
    let pending = store.pending_bookmark_edits(Some(ids.unread)).unwrap();
    assert_eq!(pending.deletes.len(), 1);
    assert_eq!(
        pending.deletes[0].kind,
        BookmarkEditKind::Delete {
            bookmark_id: 1,
            source_folder_local_id: ids.unread
        }
    );
}

#[test]
fn test_remove_bookmark_drops_move_but_keeps_like() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();
    store.like_bookmark(1, true, false).unwrap();
    store.move_bookmark(1, ids.archive, false).unwrap();

    store.remove_bookmark(1, true).unwrap();
    let pending = store.pending_bookmark_edits(None).unwrap();
    assert!(pending.moves.is_empty());
    assert!(pending.deletes.is_empty());
    assert_eq!(pending.likes.len(), 1);
}

#[test]
fn test_remove_missing_bookmark_fails() {
    let (store, _) = store();
    assert!(matches!(store.remove_bookmark(7, false), Err(StoreError::BookmarkNotFound(7))));
}

#[test]
fn test_move_bookmark_replaces_earlier_move() {
    let (store, ids) = store();
    let reading = store.add_folder("Reading", false).unwrap();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();

    store.move_bookmark(1, reading.local_id, false).unwrap();
    let moved = store.move_bookmark(1, ids.archive, false).unwrap();
    assert_eq!(moved.folder_local_id, ids.archive);
    assert_eq!(moved.remote_folder_id.as_deref(), Some("archive"));

    let pending = store.pending_bookmark_edits(None).unwrap();
    assert_eq!(pending.moves.len(), 1);
    assert_eq!(
        pending.moves[0].kind,
        BookmarkEditKind::Move {
            bookmark_id: 1,
            source_folder_local_id: reading.local_id,
            destination_folder_local_id: ids.archive
        }
    );
}

#[test]
fn test_move_edits_are_visible_from_both_folders() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();
    store.move_bookmark(1, ids.archive, false).unwrap();

    assert_eq!(store.pending_bookmark_edits(Some(ids.unread)).unwrap().moves.len(), 1);
    assert_eq!(store.pending_bookmark_edits(Some(ids.archive)).unwrap().moves.len(), 1);
    assert!(store.pending_bookmark_edits(Some(ids.orphaned)).unwrap().is_empty());
}

#[test]
fn test_move_from_remote_records_nothing() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();
    store.move_bookmark(1, ids.orphaned, true).unwrap();

    assert_eq!(store.get_bookmark(1).unwrap().unwrap().folder_local_id, ids.orphaned);
    assert!(store.pending_bookmark_edits(None).unwrap().is_empty());
}

#[test]
fn test_move_to_invalid_destinations_is_rejected() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();

    assert!(matches!(store.move_bookmark(1, 9999, false), Err(StoreError::FolderNotFound(9999))));
    assert!(matches!(
        store.move_bookmark(1, ids.liked, false),
        Err(StoreError::InvalidDestination(_))
    ));
    assert!(matches!(store.move_bookmark(2, ids.archive, false), Err(StoreError::BookmarkNotFound(2))));

    assert_eq!(store.get_bookmark(1).unwrap().unwrap().folder_local_id, ids.unread);
    assert!(store.pending_bookmark_edits(None).unwrap().is_empty());
}

#[test]
fn test_like_then_unlike_leaves_no_edit() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();

    store.like_bookmark(1, true, false).unwrap();
    let unliked = store.unlike_bookmark(1, true, false).unwrap().unwrap();

    assert!(!unliked.starred);
    assert!(store.pending_bookmark_edits(None).unwrap().is_empty());
}

#[test]
fn test_repeated_like_records_one_edit() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();
    store.like_bookmark(1, true, false).unwrap();
    store.like_bookmark(1, true, false).unwrap();

    let pending = store.pending_bookmark_edits(None).unwrap();
    assert_eq!(pending.likes.len(), 1);
    assert!(pending.unlikes.is_empty());
}

#[test]
fn test_like_missing_bookmark() {
    let (store, _) = store();
    assert!(store.like_bookmark(5, false, true).unwrap().is_none());
    assert!(matches!(store.like_bookmark(5, true, false), Err(StoreError::BookmarkNotFound(5))));
}

#[test]
fn test_update_read_progress_invalidates_hash() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();

    let updated = store.update_read_progress(1, 0.4).unwrap();
    assert_eq!(updated.progress, 0.4);
    assert!(updated.progress_timestamp > 0);
    assert_ne!(updated.hash, Some("hash-1".to_string()));

    let again = store.update_read_progress(1, 0.4).unwrap();
    assert_ne!(again.hash, updated.hash, "every update gets a fresh hash");
    assert_eq!(store.get_bookmark(1).unwrap().unwrap(), again);
}

#[test]
fn test_update_bookmark_keeps_edit_log_untouched() {
    let (store, ids) = store();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();

    let mut changed = bookmark(1, ids.unread);
    changed.title = "Retitled".to_string();
    changed.local_folder_relative_path = Some("articles/1".to_string());
    store.update_bookmark(&changed, false).unwrap();

    assert_eq!(store.get_bookmark(1).unwrap().unwrap(), changed);
    assert!(store.pending_bookmark_edits(None).unwrap().is_empty());
    assert!(matches!(
        store.update_bookmark(&bookmark(2, ids.unread), true),
        Err(StoreError::BookmarkNotFound(2))
    ));
}

#[test]
fn test_pending_adds_keep_submission_order() {
    let (store, _) = store();
    store.add_pending_url("https://example.com/a", None).unwrap();
    store.add_pending_url("https://example.com/b", Some("B")).unwrap();

    let adds = store.pending_bookmark_adds().unwrap();
    let urls: Vec<&str> = adds
        .iter()
        .filter_map(|e| match &e.kind {
            BookmarkEditKind::Add { url, .. } => Some(url.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);

    store.delete_pending_bookmark_edit(adds[0].id).unwrap();
    assert_eq!(store.pending_bookmark_adds().unwrap().len(), 1);
}

#[test]
fn test_removing_folder_parks_bookmarks_in_orphaned() {
    let (store, ids) = store();
    let reading = store.add_folder("Reading", false).unwrap();
    store.add_bookmark(&bookmark(1, reading.local_id)).unwrap();

    store.remove_folder(reading.local_id, false).unwrap();
    let parked = store.get_bookmark(1).unwrap().unwrap();
    assert_eq!(parked.folder_local_id, ids.orphaned);
    assert!(parked.remote_folder_id.is_none());
}

#[test]
fn test_removing_folder_retargets_pending_edits() {
    let (store, ids) = store();
    let reading = store.add_folder("Reading", false).unwrap();
    store.add_bookmark(&bookmark(1, reading.local_id)).unwrap();
    store.add_bookmark(&bookmark(2, ids.unread)).unwrap();
    store.remove_bookmark(1, false).unwrap();
    store.move_bookmark(2, reading.local_id, false).unwrap();

    store.remove_folder(reading.local_id, false).unwrap();

    let pending = store.pending_bookmark_edits(None).unwrap();
    assert!(pending.moves.is_empty(), "a move into a removed folder is dropped");
    assert_eq!(
        pending.deletes[0].kind,
        BookmarkEditKind::Delete {
            bookmark_id: 1,
            source_folder_local_id: ids.orphaned
        }
    );
    assert_eq!(store.get_bookmark(2).unwrap().unwrap().folder_local_id, ids.orphaned);
}

#[test]
fn test_folder_remote_id_cascades_to_bookmarks() {
    let (store, _) = store();
    let mut reading = store.add_folder("Reading", false).unwrap();
    store.add_bookmark(&bookmark(1, reading.local_id)).unwrap();

    reading.remote_folder_id = Some("77".to_string());
    store.update_folder(&reading).unwrap();
    assert_eq!(store.get_bookmark(1).unwrap().unwrap().remote_folder_id.as_deref(), Some("77"));
}

#[tokio::test]
async fn test_bookmark_events_follow_writes() {
    let (store, ids) = store();
    let mut events = store.subscribe(StoreEventKind::Bookmarks);

    store.add_folder("Ignored", false).unwrap();
    store.add_bookmark(&bookmark(1, ids.unread)).unwrap();
    store.move_bookmark(1, ids.archive, false).unwrap();

    let Some(StoreEvent::Bookmarks(added)) = events.next().await else {
        panic!("expected a bookmark event");
    };
    assert_eq!(added.operation, BookmarkOperation::Add);

    let Some(StoreEvent::Bookmarks(moved)) = events.next().await else {
        panic!("expected a bookmark event");
    };
    assert_eq!(moved.operation, BookmarkOperation::Move);
    assert_eq!(moved.source_folder_local_id, Some(ids.unread));
    assert_eq!(moved.destination_folder_local_id, Some(ids.archive));
}
