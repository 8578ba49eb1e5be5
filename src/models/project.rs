//! Represents a project — the top-level container for folders and files.

use super::{file_record::FileRecord, folder::Folder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A project owned by a single user.
///
/// Deleting a project cascades: every file and folder under it is removed,
/// together with the backend objects (best effort).
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique identifier.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Optional free-form description.
    pub description: Option<String>,

    /// User that owns this project and everything in it.
    pub owner_id: Uuid,

    /// When this project was created.
    pub created_at: DateTime<Utc>,
}

/// A project together with its folders and non-deleted files, as returned
/// by the single-project read endpoint.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub folders: Vec<Folder>,
    pub files: Vec<FileRecord>,
}
