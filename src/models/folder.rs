//! Represents a folder inside a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named grouping of files within a project. Removed together with its
/// project on cascade delete; files referencing a deleted folder fall back
/// to the project root.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Unique identifier.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Parent project.
    pub project_id: Uuid,

    /// When this folder was created.
    pub created_at: DateTime<Utc>,
}
