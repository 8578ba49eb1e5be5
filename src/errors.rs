//! Error types shared across services and handlers.
//!
//! Services speak [`FileError`] (the domain taxonomy); handlers convert it
//! into [`AppError`], which renders a JSON body with a stable machine code
//! alongside the human-readable message.

use crate::services::object_store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Domain error taxonomy for the upload coordinator and file lifecycle.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("file size {size} exceeds limit of {max} bytes")]
    SizeLimitExceeded { size: i64, max: i64 },
    #[error("project not found")]
    ProjectNotFound,
    #[error("file not found")]
    FileNotFound,
    #[error("backend object `{0}` is missing")]
    ObjectMissing(String),
    #[error("transfer failed: {0}")]
    Transfer(#[from] StoreError),
    #[error("server-mediated upload is disabled; upload directly to the object store")]
    DirectUploadConfigured,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl FileError {
    /// Stable machine-readable code, independent of the display message.
    pub fn code(&self) -> &'static str {
        match self {
            FileError::Unauthorized => "unauthorized",
            FileError::Validation(_) => "validation_error",
            FileError::SizeLimitExceeded { .. } => "size_limit_exceeded",
            FileError::ProjectNotFound | FileError::FileNotFound => "not_found",
            FileError::ObjectMissing(_) => "object_missing",
            FileError::Transfer(_) => "transfer_error",
            FileError::DirectUploadConfigured => "direct_upload_configured",
            FileError::Sqlx(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FileError::Unauthorized => StatusCode::UNAUTHORIZED,
            FileError::Validation(_)
            | FileError::SizeLimitExceeded { .. }
            | FileError::DirectUploadConfigured => StatusCode::BAD_REQUEST,
            FileError::ProjectNotFound | FileError::FileNotFound | FileError::ObjectMissing(_) => {
                StatusCode::NOT_FOUND
            }
            FileError::Transfer(_) | FileError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A lightweight wrapper for HTTP-facing errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, code and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "code": self.code,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        let status = err.status();
        let code = err.code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {err}");
        }
        AppError::new(status, code, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
