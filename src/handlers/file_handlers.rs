//! Retrieval proxy and per-file lifecycle handlers.
//!
//! Retrieval resolves a logical reference to its metadata record, pulls the
//! bytes from whichever backend holds them, and streams large objects
//! instead of buffering.

use crate::{
    errors::{AppError, FileError},
    models::file_record::FileRecord,
    services::{lifecycle::UpdateFileRequest, object_store::StoreError},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use uuid::Uuid;

const CACHE_CONTROL_VALUE: &str = "public, max-age=31536000";

/// `GET /api/storage/{*key}` — stream a stored object to the caller.
///
/// Metadata missing and backend object missing are both 404, with distinct
/// machine codes so drift between the two stores is observable.
pub async fn download_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let record = state
        .lifecycle
        .find_by_object_key(&key)
        .await?
        .ok_or(FileError::FileNotFound)?;

    let reader = state.store.get(&key).await.map_err(|err| match err {
        StoreError::MissingObject(k) => FileError::ObjectMissing(k),
        other => FileError::Transfer(other),
    })?;

    let mut response = if record.size_bytes > state.stream_threshold {
        let mut response = Response::new(Body::from_stream(reader.into_stream()));
        set_content_length(response.headers_mut(), record.size_bytes.max(0) as u64);
        response
    } else {
        let bytes = reader.buffered().await.map_err(FileError::Transfer)?;
        let len = bytes.len() as u64;
        let mut response = Response::new(Body::from(bytes));
        set_content_length(response.headers_mut(), len);
        response
    };

    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&record.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&record.original_name),
    );

    Ok(response)
}

/// `DELETE /api/files/{id}` — soft delete: mark the record as trashed,
/// leave the stored bytes alone.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    state.lifecycle.soft_delete(&principal, id).await?;
    Ok(Json(json!({ "success": true })))
}

/// `PATCH /api/files/{id}` — rename or move a file's metadata.
pub async fn update_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<FileRecord>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let record = state.lifecycle.update_record(&principal, id, &req).await?;
    Ok(Json(record))
}

fn set_content_length(headers: &mut HeaderMap, len: u64) {
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&len.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
}

/// Dual-form disposition: an ASCII-sanitized `filename` for old clients and
/// a percent-encoded UTF-8 `filename*` for everyone else.
fn content_disposition(original_name: &str) -> HeaderValue {
    let ascii: String = original_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = urlencoding::encode(original_name);
    HeaderValue::from_str(&format!(
        "inline; filename=\"{ascii}\"; filename*=UTF-8''{encoded}"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}
