//! Unit tests for the remote error vocabulary and recoverable-error handling.

use rstest::rstest;

use shelfsync::services::remote::{
    absorb, codes, is_duplicate_folder_title, is_ignorable_move_failure, is_missing_bookmark,
    is_missing_folder,
};
use shelfsync::types::errors::RemoteError;
use shelfsync::types::remote::{BookmarkAddParams, ListMeta, RemoteBookmark};

fn api(code: u32) -> RemoteError {
    RemoteError::api(code, "test")
}

#[rstest]
#[case(codes::BOOKMARK_NOT_FOUND, true, false, false, true)]
#[case(codes::FOLDER_NOT_FOUND, false, true, false, true)]
#[case(codes::FOLDER_DELETE_FAILED, false, true, false, false)]
#[case(codes::DUPLICATE_FOLDER_TITLE, false, false, true, false)]
#[case(codes::MOVE_FAILED, false, false, false, true)]
#[case(1550, false, false, false, false)]
fn test_error_code_classification(
    #[case] code: u32,
    #[case] missing_bookmark: bool,
    #[case] missing_folder: bool,
    #[case] duplicate_title: bool,
    #[case] ignorable_move: bool,
) {
    let err = api(code);
    assert_eq!(is_missing_bookmark(&err), missing_bookmark);
    assert_eq!(is_missing_folder(&err), missing_folder);
    assert_eq!(is_duplicate_folder_title(&err), duplicate_title);
    assert_eq!(is_ignorable_move_failure(&err), ignorable_move);
}

#[test]
fn test_transport_errors_are_never_recoverable() {
    let err = RemoteError::Transport("connection reset".to_string());
    assert_eq!(err.code(), None);
    assert!(!is_missing_bookmark(&err));
    assert!(!is_ignorable_move_failure(&err));
}

#[test]
fn test_absorb_swallows_only_matching_errors() {
    assert_eq!(absorb(Ok::<_, RemoteError>(3), is_missing_bookmark), Ok(Some(3)));
    assert_eq!(absorb::<u8>(Err(api(codes::BOOKMARK_NOT_FOUND)), is_missing_bookmark), Ok(None));
    assert_eq!(
        absorb::<u8>(Err(api(codes::FOLDER_NOT_FOUND)), is_missing_bookmark),
        Err(api(codes::FOLDER_NOT_FOUND))
    );
}

#[test]
fn test_remote_bookmark_coerces_wire_strings() {
    let remote: RemoteBookmark = serde_json::from_value(serde_json::json!({
        "bookmark_id": 12,
        "title": "T",
        "url": "https://example.com",
        "hash": "abc",
        "starred": "1",
        "progress": "0.25",
        "progress_timestamp": 1700000000
    }))
    .unwrap();
    assert!(remote.starred_flag().unwrap());
    assert_eq!(remote.progress_value().unwrap(), 0.25);

    let numeric: RemoteBookmark = serde_json::from_value(serde_json::json!({
        "bookmark_id": 13,
        "starred": 0,
        "progress": 1
    }))
    .unwrap();
    assert!(!numeric.starred_flag().unwrap());
    assert_eq!(numeric.progress_value().unwrap(), 1.0);
}

#[test]
fn test_garbled_starred_is_malformed() {
    let remote: RemoteBookmark = serde_json::from_value(serde_json::json!({
        "bookmark_id": 14,
        "starred": "yes"
    }))
    .unwrap();
    assert!(matches!(remote.starred_flag(), Err(RemoteError::Malformed(_))));
}

#[rstest]
#[case(None, vec![])]
#[case(Some(""), vec![])]
#[case(Some("5"), vec![5])]
#[case(Some("5,7, 9"), vec![5, 7, 9])]
fn test_delete_ids_parsing(#[case] raw: Option<&str>, #[case] expected: Vec<i64>) {
    let meta = ListMeta {
        delete_ids: raw.map(str::to_string),
    };
    assert_eq!(meta.delete_ids().unwrap(), expected);
}

#[test]
fn test_delete_ids_rejects_garbage() {
    let meta = ListMeta {
        delete_ids: Some("5,x".to_string()),
    };
    assert!(meta.delete_ids().is_err());
}

#[test]
fn test_add_params_from_url() {
    let params = BookmarkAddParams::url("https://example.com/a");
    assert_eq!(params.url, "https://example.com/a");
    assert!(params.title.is_none());
    assert!(params.folder_id.is_none());
}
