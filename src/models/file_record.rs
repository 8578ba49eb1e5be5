//! Represents a confirmed upload: the durable metadata row behind one
//! object-store blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for one uploaded file.
///
/// A `FileRecord` exists only after a transfer has been confirmed; the bytes
/// it points at may have been sitting in the object store for a while before
/// the row was written. The record stores what the caller claimed about the
/// file, not what the store verified.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Internal UUID, assigned at confirmation.
    pub id: Uuid,

    /// Object-store key, format `<projectId>/<millis>-<token>.<ext>`.
    /// Assigned at negotiation, before any bytes move. Not unique in the
    /// table: confirming the same key twice creates two rows.
    pub object_key: String,

    /// Filename as the uploader named it.
    pub original_name: String,

    /// Caller-supplied MIME type, copied verbatim.
    pub mime_type: String,

    /// Caller-supplied size in bytes, not verified against the store.
    pub size_bytes: i64,

    /// Backend-specific locator returned by the object store.
    pub storage_url: String,

    /// Equals `storage_url` for `image/*` files, otherwise absent.
    pub thumbnail_url: Option<String>,

    /// Owning project.
    pub project_id: Uuid,

    /// Optional folder within the project.
    pub folder_id: Option<Uuid>,

    /// User who confirmed the upload.
    pub owner_id: Uuid,

    /// Soft-delete marker. The backend object is untouched by soft delete.
    pub is_deleted: bool,

    /// When the record was soft-deleted, if ever.
    pub deleted_at: Option<DateTime<Utc>>,

    /// When the record was created (confirmation time).
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Logical, backend-independent reference path for this file. Stable
    /// across storage backend swaps because it is addressed by object key,
    /// not by the raw backend locator.
    pub fn reference_path(&self) -> String {
        format!("/api/storage/{}", self.object_key)
    }
}
