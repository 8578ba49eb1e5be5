//! File lifecycle: soft delete, record updates, retrieval lookup, and the
//! cascade that removes a project together with its stored objects.

use crate::{
    errors::FileError,
    models::file_record::FileRecord,
    services::{auth::Principal, object_store::ObjectStore},
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const FILE_COLUMNS: &str = "id, object_key, original_name, mime_type, size_bytes, \
     storage_url, thumbnail_url, project_id, folder_id, owner_id, \
     is_deleted, deleted_at, created_at";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub original_name: Option<String>,
    pub folder_id: Option<String>,
    pub project_id: Option<String>,
}

/// Outcome of a project cascade delete. Metadata removal always completes;
/// backend deletions are best effort and failures are only counted.
#[derive(Debug)]
pub struct CascadeReport {
    pub files_total: usize,
    pub objects_failed: usize,
}

#[derive(Clone)]
pub struct FileLifecycleManager {
    db: Arc<SqlitePool>,
    store: ObjectStore,
}

impl FileLifecycleManager {
    pub fn new(db: Arc<SqlitePool>, store: ObjectStore) -> Self {
        Self { db, store }
    }

    /// Move a file to the trash: flips the soft-delete markers and nothing
    /// else. The backend object stays where it is and the record stays
    /// resolvable by object key.
    pub async fn soft_delete(&self, principal: &Principal, id: Uuid) -> Result<(), FileError> {
        let result =
            sqlx::query("UPDATE files SET is_deleted = 1, deleted_at = ? WHERE id = ? AND owner_id = ?")
                .bind(Utc::now())
                .bind(id)
                .bind(principal.user_id)
                .execute(&*self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(FileError::FileNotFound);
        }
        Ok(())
    }

    /// Rename a file or move it between folders/projects. Only the fields
    /// present in the request change.
    pub async fn update_record(
        &self,
        principal: &Principal,
        id: Uuid,
        req: &UpdateFileRequest,
    ) -> Result<FileRecord, FileError> {
        self.find_owned_file(principal, id).await?;

        let folder_id = parse_optional_id(&req.folder_id, "folderId")?;
        let project_id = parse_optional_id(&req.project_id, "projectId")?;

        let has_changes = req.original_name.is_some() || folder_id.is_some() || project_id.is_some();
        if has_changes {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE files SET ");
            let mut updates = builder.separated(", ");
            if let Some(name) = &req.original_name {
                updates.push("original_name = ").push_bind_unseparated(name);
            }
            if let Some(folder) = folder_id {
                updates.push("folder_id = ").push_bind_unseparated(folder);
            }
            if let Some(project) = project_id {
                updates.push("project_id = ").push_bind_unseparated(project);
            }
            builder.push(" WHERE id = ");
            builder.push_bind(id);
            builder.build().execute(&*self.db).await?;
        }

        self.find_owned_file(principal, id).await
    }

    /// Resolve a logical reference (object key) to its metadata record.
    /// Soft-deleted records still resolve; duplicate confirmations resolve
    /// to the earliest record.
    pub async fn find_by_object_key(&self, key: &str) -> Result<Option<FileRecord>, FileError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE object_key = ? ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    /// Remove a project, its stored objects, and every file/folder row under
    /// it.
    ///
    /// Backend deletions come first and are best effort: a failure on one
    /// object is logged and the loop continues. Metadata removal then runs in
    /// one transaction. The two stores are intentionally not atomic with each
    /// other; a failure between them leaves orphaned bytes or orphaned rows.
    pub async fn delete_project_cascade(
        &self,
        principal: &Principal,
        project_id: Uuid,
    ) -> Result<CascadeReport, FileError> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM projects WHERE id = ? AND owner_id = ?")
            .bind(project_id)
            .bind(principal.user_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(FileError::ProjectNotFound)?;

        let keys =
            sqlx::query_scalar::<_, String>("SELECT object_key FROM files WHERE project_id = ?")
                .bind(project_id)
                .fetch_all(&*self.db)
                .await?;

        let files_total = keys.len();
        let mut objects_failed = 0usize;
        for key in &keys {
            if let Err(err) = self.store.delete_object(key).await {
                objects_failed += 1;
                warn!("cascade delete: failed to remove object `{}`: {}", key, err);
            }
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM files WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM folders WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(CascadeReport {
            files_total,
            objects_failed,
        })
    }

    async fn find_owned_file(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<FileRecord, FileError> {
        sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(principal.user_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(FileError::FileNotFound)
    }
}

fn parse_optional_id(raw: &Option<String>, name: &str) -> Result<Option<Uuid>, FileError> {
    match raw.as_deref().filter(|s| !s.is_empty()) {
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| FileError::Validation(format!("{name} is not a valid id"))),
        None => Ok(None),
    }
}
