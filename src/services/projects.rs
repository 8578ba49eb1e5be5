//! Project CRUD — the minimum the upload coordinator's ownership checks and
//! the cascade delete need. Page-level navigation and search live elsewhere.

use crate::{
    errors::FileError,
    models::{
        file_record::FileRecord,
        folder::Folder,
        project::{Project, ProjectDetail},
    },
    services::auth::Principal,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct ProjectService {
    db: Arc<SqlitePool>,
}

impl ProjectService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        req: &CreateProjectRequest,
    ) -> Result<Project, FileError> {
        let name = req
            .name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| FileError::Validation("name is required".into()))?;

        let project = sqlx::query_as::<_, Project>(
            "INSERT INTO projects (id, name, description, owner_id, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, name, description, owner_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&req.description)
        .bind(principal.user_id)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        Ok(project)
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<Project>, FileError> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT id, name, description, owner_id, created_at
             FROM projects WHERE owner_id = ? ORDER BY created_at DESC",
        )
        .bind(principal.user_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(projects)
    }

    /// One project with its folders and its non-deleted files.
    pub async fn get_detail(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<ProjectDetail, FileError> {
        let project = self.find_owned(principal, id).await?;

        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, project_id, created_at
             FROM folders WHERE project_id = ? ORDER BY name ASC",
        )
        .bind(id)
        .fetch_all(&*self.db)
        .await?;

        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT id, object_key, original_name, mime_type, size_bytes,
                    storage_url, thumbnail_url, project_id, folder_id, owner_id,
                    is_deleted, deleted_at, created_at
             FROM files
             WHERE project_id = ? AND is_deleted = 0
             ORDER BY created_at DESC",
        )
        .bind(id)
        .fetch_all(&*self.db)
        .await?;

        Ok(ProjectDetail {
            project,
            folders,
            files,
        })
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        req: &UpdateProjectRequest,
    ) -> Result<Project, FileError> {
        self.find_owned(principal, id).await?;

        if req.name.is_some() || req.description.is_some() {
            let mut builder = QueryBuilder::<Sqlite>::new("UPDATE projects SET ");
            let mut updates = builder.separated(", ");
            if let Some(name) = &req.name {
                updates.push("name = ").push_bind_unseparated(name);
            }
            if let Some(description) = &req.description {
                updates
                    .push("description = ")
                    .push_bind_unseparated(description);
            }
            builder.push(" WHERE id = ");
            builder.push_bind(id);
            builder.build().execute(&*self.db).await?;
        }

        self.find_owned(principal, id).await
    }

    async fn find_owned(&self, principal: &Principal, id: Uuid) -> Result<Project, FileError> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, description, owner_id, created_at
             FROM projects WHERE id = ? AND owner_id = ?",
        )
        .bind(id)
        .bind(principal.user_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(FileError::ProjectNotFound)
    }
}
