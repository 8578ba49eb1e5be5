//! Control-plane and mediated data-plane handlers for the three-phase
//! upload handshake.

use crate::{
    errors::{AppError, FileError},
    models::file_record::FileRecord,
    services::upload::{ConfirmRequest, NegotiateRequest, NegotiateResponse},
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::Serialize;
use serde_json::{Value, json};

/// The confirmed record plus its stable, backend-independent link.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    #[serde(flatten)]
    pub file: FileRecord,
    pub public_url: String,
}

/// `POST /api/files/prepare-upload` — authorize the intended upload and
/// hand out transfer parameters. Writes nothing.
pub async fn prepare_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NegotiateRequest>,
) -> Result<Json<NegotiateResponse>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let resp = state.uploads.negotiate(&principal, &req).await?;
    Ok(Json(resp))
}

/// `PUT /api/files/upload/{*key}` — server-mediated data plane. The raw
/// body is fed through the chunk transfer engine into the configured store.
/// Refused when the deployment expects clients to upload directly.
pub async fn transfer_upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    state.authorizer.authorize(&headers).await?;

    if state.direct_upload {
        return Err(FileError::DirectUploadConfigured.into());
    }

    let size = body.len() as i64;
    let max = state.uploads.max_upload_size();
    if size > max {
        return Err(FileError::SizeLimitExceeded { size, max }.into());
    }

    let locator = state
        .engine
        .transfer(&state.store, &key, body, |progress| {
            tracing::debug!(key = %key, progress, "chunk acknowledged");
        })
        .await
        .map_err(FileError::Transfer)?;

    Ok(Json(json!({ "url": locator, "sizeBytes": size })))
}

/// `POST /api/files/confirm-upload` — finalize a completed transfer by
/// writing the metadata record.
pub async fn confirm_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, AppError> {
    let principal = state.authorizer.authorize(&headers).await?;
    let (file, public_url) = state.uploads.confirm(&principal, &req).await?;
    Ok(Json(ConfirmResponse { file, public_url }))
}
