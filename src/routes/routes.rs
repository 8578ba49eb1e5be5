//! Defines routes for the upload coordinator and file lifecycle.
//!
//! ## Structure
//! - **Upload handshake**
//!   - `POST /api/files/prepare-upload` — negotiate an upload (control plane)
//!   - `PUT  /api/files/upload/{*key}` — server-mediated transfer (data plane)
//!   - `POST /api/files/confirm-upload` — confirm and write metadata
//!
//! - **Files**
//!   - `GET    /api/storage/{*key}` — stream a stored object by logical key
//!   - `DELETE /api/files/{id}` — soft delete (trash)
//!   - `PATCH  /api/files/{id}` — rename / move
//!
//! - **Projects**
//!   - `GET/POST /api/projects`, `GET/PATCH/DELETE /api/projects/{id}`
//!     (DELETE cascades to files, folders and stored objects)
//!
//! The wildcard `*key` allows nested keys like `p1/1700000000000-a1b2c3d.png`.

use crate::{
    handlers::{
        file_handlers::{delete_file, download_file, update_file},
        health_handlers::{healthz, readyz},
        project_handlers::{
            create_project, delete_project, get_project, list_projects, update_project,
        },
        upload_handlers::{confirm_upload, prepare_upload, transfer_upload},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Build and return the router for all coordinator routes.
///
/// The router carries shared state (`AppState`) to all handlers. The body
/// limit follows the configured upload ceiling so the data-plane route can
/// accept full payloads.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // upload handshake
        .route("/api/files/prepare-upload", post(prepare_upload))
        .route("/api/files/upload/{*key}", put(transfer_upload))
        .route("/api/files/confirm-upload", post(confirm_upload))
        // file lifecycle + retrieval
        .route("/api/files/{id}", delete(delete_file).patch(update_file))
        .route("/api/storage/{*key}", get(download_file))
        // projects
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
