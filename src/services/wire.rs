//! Wire adapter for the remote service's JSON-array responses and form
//! encoded requests.
//!
//! Every response body is a JSON array. A single-element array whose element
//! has `"type": "error"` carries an `error_code` and is turned into
//! [`RemoteError::Api`]. A transport implementing
//! [`RemoteService`](crate::services::remote::RemoteService) sends the forms
//! built here and hands the raw bodies to the decoders.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::services::remote::codes;
use crate::types::errors::RemoteError;
use crate::types::remote::{
    BookmarkAddParams, BookmarkListParams, BookmarkListResult, BookmarkMoveParams, HaveStatus,
    ListMeta, ReadProgressParams, RemoteBookmark, RemoteFolder,
};

/// Form fields for a request, in the order they should be sent.
pub type Form = Vec<(&'static str, String)>;

fn malformed(what: impl std::fmt::Display) -> RemoteError {
    RemoteError::Malformed(what.to_string())
}

/// Returns the API error carried by `value`, if it is an error object.
pub fn decode_error(value: &Value) -> Option<RemoteError> {
    if value.get("type").and_then(Value::as_str) != Some("error") {
        return None;
    }

    let code = value
        .get("error_code")
        .and_then(|c| c.as_u64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0) as u32;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(RemoteError::Api { code, message })
}

/// Parses a response body into its array elements, surfacing error objects.
fn parse_array(body: &str) -> Result<Vec<Value>, RemoteError> {
    let parsed: Value = serde_json::from_str(body).map_err(malformed)?;
    let Value::Array(items) = parsed else {
        return Err(malformed("response was not a JSON array"));
    };

    if items.len() == 1 {
        if let Some(err) = decode_error(&items[0]) {
            return Err(err);
        }
    }
    Ok(items)
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(malformed)
}

fn single(body: &str) -> Result<Value, RemoteError> {
    parse_array(body)?
        .into_iter()
        .next()
        .ok_or_else(|| malformed("empty response array"))
}

/// Decodes a bare success response (delete calls), surfacing error objects.
pub fn decode_ack(body: &str) -> Result<(), RemoteError> {
    parse_array(body).map(|_| ())
}

/// Decodes `folders/list`.
pub fn decode_folders(body: &str) -> Result<Vec<RemoteFolder>, RemoteError> {
    parse_array(body)?
        .into_iter()
        .filter(|item| matches!(item.get("type").and_then(Value::as_str), None | Some("folder")))
        .map(from_value)
        .collect()
}

/// Decodes `folders/add`. The service answers a duplicate title with a
/// folder object lacking `folder_id`.
pub fn decode_added_folder(body: &str) -> Result<RemoteFolder, RemoteError> {
    let item = single(body)?;
    if item.get("folder_id").map_or(true, Value::is_null) {
        return Err(RemoteError::api(
            codes::DUPLICATE_FOLDER_TITLE,
            "User already has a folder with this title",
        ));
    }
    from_value(item)
}

/// Decodes a single-bookmark response (add, move, star, archive, ...).
pub fn decode_bookmark(body: &str) -> Result<RemoteBookmark, RemoteError> {
    from_value(single(body)?)
}

/// Decodes `bookmarks/list`: a `meta` element, a `user` element, then the
/// bookmarks that differ from the supplied have-list.
pub fn decode_bookmark_list(body: &str, duration_ms: u64) -> Result<BookmarkListResult, RemoteError> {
    let mut result = BookmarkListResult {
        duration_ms,
        ..BookmarkListResult::default()
    };

    for item in parse_array(body)? {
        match item.get("type").and_then(Value::as_str) {
            Some("meta") => result.meta = from_value::<ListMeta>(item)?,
            Some("bookmark") => result.bookmarks.push(from_value(item)?),
            _ => {}
        }
    }
    Ok(result)
}

/// Encodes one have entry as `id[:hash[:progress:progress_timestamp]]`.
pub fn encode_have(have: &HaveStatus) -> String {
    let mut encoded = have.id.to_string();
    if let Some(hash) = &have.hash {
        encoded.push(':');
        encoded.push_str(hash);
    }

    if let (Some(progress), Some(timestamp)) = (have.progress, have.progress_timestamp) {
        if timestamp != 0 {
            encoded.push_str(&format!(":{}:{}", progress, timestamp));
        }
    }
    encoded
}

pub fn encode_have_list(haves: &[HaveStatus]) -> String {
    haves.iter().map(encode_have).collect::<Vec<_>>().join(",")
}

pub fn list_form(params: &BookmarkListParams) -> Form {
    let mut form = Form::new();
    if let Some(limit) = params.limit {
        form.push(("limit", limit.to_string()));
    }
    if let Some(folder_id) = &params.folder_id {
        form.push(("folder_id", folder_id.clone()));
    }
    if !params.have.is_empty() {
        form.push(("have", encode_have_list(&params.have)));
    }
    form
}

/// Unread is the service's default destination, so it is never sent.
pub fn add_form(params: &BookmarkAddParams) -> Form {
    let mut form: Form = vec![("url", params.url.clone())];
    if let Some(title) = &params.title {
        form.push(("title", title.clone()));
    }
    if let Some(description) = &params.description {
        form.push(("description", description.clone()));
    }
    if let Some(folder_id) = params.folder_id.as_deref().filter(|f| *f != "unread") {
        form.push(("folder_id", folder_id.to_string()));
    }
    form
}

pub fn move_form(params: &BookmarkMoveParams) -> Form {
    vec![
        ("bookmark_id", params.bookmark_id.to_string()),
        ("folder_id", params.destination_folder_id.clone()),
    ]
}

pub fn progress_form(params: &ReadProgressParams) -> Form {
    vec![
        ("bookmark_id", params.bookmark_id.to_string()),
        ("progress", params.progress.to_string()),
        ("progress_timestamp", params.progress_timestamp.to_string()),
    ]
}
