//! Project handlers, including the cascade delete that removes a project
//! together with its stored objects.

use crate::{
    errors::AppError,
    models::project::{Project, ProjectDetail},
    services::projects::{CreateProjectRequest, UpdateProjectRequest},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::{Value, json};
use uuid::Uuid;

/// `POST /api/projects`
pub async fn create_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let project = state.projects.create(&principal, &req).await?;
    Ok(Json(project))
}

/// `GET /api/projects`
pub async fn list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Project>>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let projects = state.projects.list(&principal).await?;
    Ok(Json(projects))
}

/// `GET /api/projects/{id}` — the project plus its folders and non-deleted
/// files.
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ProjectDetail>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let detail = state.projects.get_detail(&principal, id).await?;
    Ok(Json(detail))
}

/// `PATCH /api/projects/{id}`
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let project = state.projects.update(&principal, id, &req).await?;
    Ok(Json(project))
}

/// `DELETE /api/projects/{id}` — cascade delete.
///
/// Best effort on the object store: per-object failures are logged and the
/// metadata removal still completes, so the response reports success even
/// when some backend objects were left behind.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let report = state.lifecycle.delete_project_cascade(&principal, id).await?;
    if report.objects_failed > 0 {
        tracing::warn!(
            project_id = %id,
            failed = report.objects_failed,
            total = report.files_total,
            "cascade delete left orphaned backend objects"
        );
    }
    Ok(Json(json!({ "success": true })))
}
