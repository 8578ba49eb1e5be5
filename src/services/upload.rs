//! Upload negotiation and confirmation — the control-plane halves of the
//! three-phase upload handshake.
//!
//! Negotiation authorizes an intended upload and hands out the object key
//! before any bytes move; it persists nothing. Confirmation runs after the
//! data-plane transfer, re-checks ownership (the transfer may have taken
//! arbitrary wall-clock time) and writes the durable [`FileRecord`].

use crate::{errors::FileError, models::file_record::FileRecord, services::auth::Principal};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateRequest {
    pub project_id: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    pub object_key: String,
    pub max_size: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub object_key: Option<String>,
    pub original_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub project_id: Option<String>,
    pub folder_id: Option<String>,
    pub storage_url: Option<String>,
}

#[derive(Clone)]
pub struct UploadService {
    db: Arc<SqlitePool>,
    max_upload_size: i64,
}

impl UploadService {
    pub fn new(db: Arc<SqlitePool>, max_upload_size: i64) -> Self {
        Self {
            db,
            max_upload_size,
        }
    }

    pub fn max_upload_size(&self) -> i64 {
        self.max_upload_size
    }

    /// Authorize an intended upload and assign its object key.
    ///
    /// Advisory only: no storage is reserved and no metadata is written. A
    /// caller that never follows through simply leaves the key unused.
    pub async fn negotiate(
        &self,
        principal: &Principal,
        req: &NegotiateRequest,
    ) -> Result<NegotiateResponse, FileError> {
        let project_id = required(&req.project_id, "projectId")?;
        let file_name = required(&req.file_name, "fileName")?;

        let file_size = req.file_size.unwrap_or(0);
        if file_size > self.max_upload_size {
            return Err(FileError::SizeLimitExceeded {
                size: file_size,
                max: self.max_upload_size,
            });
        }

        let project_id = parse_project_id(project_id)?;
        self.find_owned_project(principal, project_id).await?;

        Ok(NegotiateResponse {
            object_key: generate_object_key(project_id, file_name),
            max_size: self.max_upload_size,
        })
    }

    /// Finalize a completed transfer: re-verify ownership, derive the
    /// thumbnail, write the metadata row and return it with the logical
    /// reference path.
    ///
    /// Not idempotent: confirming the same object key twice creates two
    /// records pointing at the same stored object.
    pub async fn confirm(
        &self,
        principal: &Principal,
        req: &ConfirmRequest,
    ) -> Result<(FileRecord, String), FileError> {
        let object_key = required(&req.object_key, "objectKey")?;
        let original_name = required(&req.original_name, "originalName")?;
        let storage_url = required(&req.storage_url, "storageUrl")?;
        let project_id = required(&req.project_id, "projectId")?;
        let size_bytes = req
            .size_bytes
            .ok_or_else(|| FileError::Validation("sizeBytes is required".into()))?;

        let project_id = parse_project_id(project_id)?;
        self.find_owned_project(principal, project_id).await?;

        let folder_id = match req.folder_id.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| FileError::Validation("folderId is not a valid id".into()))?,
            ),
            None => None,
        };

        let mime_type = req
            .mime_type
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "application/octet-stream".into());
        let thumbnail_url = mime_type
            .starts_with("image/")
            .then(|| storage_url.to_string());

        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (
                id, object_key, original_name, mime_type, size_bytes,
                storage_url, thumbnail_url, project_id, folder_id, owner_id,
                is_deleted, deleted_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)
            RETURNING id, object_key, original_name, mime_type, size_bytes,
                      storage_url, thumbnail_url, project_id, folder_id, owner_id,
                      is_deleted, deleted_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(object_key)
        .bind(original_name)
        .bind(&mime_type)
        .bind(size_bytes)
        .bind(storage_url)
        .bind(thumbnail_url)
        .bind(project_id)
        .bind(folder_id)
        .bind(principal.user_id)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        let reference = record.reference_path();
        Ok((record, reference))
    }

    async fn find_owned_project(
        &self,
        principal: &Principal,
        project_id: Uuid,
    ) -> Result<(), FileError> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM projects WHERE id = ? AND owner_id = ?")
            .bind(project_id)
            .bind(principal.user_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(FileError::ProjectNotFound)?;
        Ok(())
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, FileError> {
    field
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FileError::Validation(format!("{name} is required")))
}

fn parse_project_id(raw: &str) -> Result<Uuid, FileError> {
    // A malformed id can never name an owned project.
    Uuid::parse_str(raw).map_err(|_| FileError::ProjectNotFound)
}

/// Derive the object key assigned at negotiation:
/// `<projectId>/<unixMillis>-<7 alphanumeric chars>.<ext>`.
///
/// The millisecond timestamp plus the random token make collisions
/// astronomically unlikely without any read-before-write against the store.
/// The extension is whatever follows the last dot of the file name (the
/// whole name when there is no dot).
pub fn generate_object_key(project_id: Uuid, file_name: &str) -> String {
    let ext = file_name.rsplit('.').next().unwrap_or(file_name);
    format!(
        "{}/{}-{}.{}",
        project_id,
        Utc::now().timestamp_millis(),
        random_token(7),
        ext
    )
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{memory_pool, seed_project, seed_user};
    use std::collections::HashSet;

    const TEN_MIB: i64 = 10 * 1024 * 1024;

    fn negotiate_req(project_id: Uuid, file_name: &str, file_size: i64) -> NegotiateRequest {
        NegotiateRequest {
            project_id: Some(project_id.to_string()),
            file_name: Some(file_name.into()),
            file_size: Some(file_size),
            mime_type: Some("image/png".into()),
        }
    }

    fn confirm_req(project_id: Uuid, object_key: &str) -> ConfirmRequest {
        ConfirmRequest {
            object_key: Some(object_key.into()),
            original_name: Some("photo.png".into()),
            mime_type: Some("image/png".into()),
            size_bytes: Some(2_000_000),
            project_id: Some(project_id.to_string()),
            folder_id: None,
            storage_url: Some(format!("/api/storage/{object_key}")),
        }
    }

    async fn setup() -> (UploadService, Principal, Uuid) {
        let db = memory_pool().await;
        let user_id = seed_user(&db).await;
        let project_id = seed_project(&db, user_id).await;
        (
            UploadService::new(db, TEN_MIB),
            Principal { user_id },
            project_id,
        )
    }

    #[tokio::test]
    async fn negotiate_returns_well_formed_key() {
        let (service, principal, project_id) = setup().await;

        let resp = service
            .negotiate(&principal, &negotiate_req(project_id, "a.png", 2_000_000))
            .await
            .unwrap();

        assert_eq!(resp.max_size, TEN_MIB);
        let rest = resp
            .object_key
            .strip_prefix(&format!("{project_id}/"))
            .expect("key is prefixed by project id");
        let stem = rest.strip_suffix(".png").expect("key keeps the extension");
        let (millis, token) = stem.split_once('-').expect("timestamp-token stem");
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(token.len(), 7);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn negotiate_size_at_limit_succeeds_above_fails() {
        let (service, principal, project_id) = setup().await;

        service
            .negotiate(&principal, &negotiate_req(project_id, "a.bin", TEN_MIB))
            .await
            .unwrap();

        let err = service
            .negotiate(&principal, &negotiate_req(project_id, "a.bin", TEN_MIB + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::SizeLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn negotiate_requires_project_and_file_name() {
        let (service, principal, project_id) = setup().await;

        let mut req = negotiate_req(project_id, "a.png", 1);
        req.file_name = None;
        assert!(matches!(
            service.negotiate(&principal, &req).await.unwrap_err(),
            FileError::Validation(_)
        ));

        let mut req = negotiate_req(project_id, "a.png", 1);
        req.project_id = Some(String::new());
        assert!(matches!(
            service.negotiate(&principal, &req).await.unwrap_err(),
            FileError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn negotiate_rejects_foreign_and_unknown_projects() {
        let (service, principal, _) = setup().await;

        let err = service
            .negotiate(&principal, &negotiate_req(Uuid::new_v4(), "a.png", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::ProjectNotFound));

        let other_user = seed_user(&service.db).await;
        let other_project = seed_project(&service.db, other_user).await;
        let err = service
            .negotiate(&principal, &negotiate_req(other_project, "a.png", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::ProjectNotFound));
    }

    #[test]
    fn ten_thousand_keys_are_pairwise_distinct() {
        let project_id = Uuid::new_v4();
        let keys: HashSet<String> = (0..10_000)
            .map(|_| generate_object_key(project_id, "a.png"))
            .collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn extension_falls_back_to_whole_name_without_dot() {
        let project_id = Uuid::new_v4();
        let key = generate_object_key(project_id, "archive");
        assert!(key.ends_with(".archive"));
    }

    #[tokio::test]
    async fn confirm_writes_record_and_reference() {
        let (service, principal, project_id) = setup().await;
        let key = generate_object_key(project_id, "photo.png");

        let (record, reference) = service
            .confirm(&principal, &confirm_req(project_id, &key))
            .await
            .unwrap();

        assert_eq!(record.object_key, key);
        assert_eq!(record.owner_id, principal.user_id);
        assert_eq!(reference, format!("/api/storage/{key}"));
        // image/* derives a thumbnail equal to the storage locator
        assert_eq!(record.thumbnail_url.as_deref(), Some(record.storage_url.as_str()));
        assert!(!record.is_deleted);
        assert!(record.deleted_at.is_none());
    }

    #[tokio::test]
    async fn confirm_without_size_writes_nothing() {
        let (service, principal, project_id) = setup().await;
        let key = generate_object_key(project_id, "doc.pdf");

        let mut req = confirm_req(project_id, &key);
        req.size_bytes = None;
        let err = service.confirm(&principal, &req).await.unwrap_err();
        assert!(matches!(err, FileError::Validation(_)));

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files")
            .fetch_one(&*service.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn confirm_non_image_has_no_thumbnail() {
        let (service, principal, project_id) = setup().await;
        let key = generate_object_key(project_id, "doc.pdf");

        let mut req = confirm_req(project_id, &key);
        req.mime_type = Some("application/pdf".into());
        let (record, _) = service.confirm(&principal, &req).await.unwrap();
        assert!(record.thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn confirm_is_not_idempotent() {
        let (service, principal, project_id) = setup().await;
        let key = generate_object_key(project_id, "photo.png");

        let (first, _) = service
            .confirm(&principal, &confirm_req(project_id, &key))
            .await
            .unwrap();
        let (second, _) = service
            .confirm(&principal, &confirm_req(project_id, &key))
            .await
            .unwrap();

        // Two distinct records for the same stored object; documented
        // behavior of the confirmation step.
        assert_ne!(first.id, second.id);
        assert_eq!(first.object_key, second.object_key);
    }
}
