//! Request authorization.
//!
//! Credential issuance lives elsewhere; this service only resolves a bearer
//! token into a [`Principal`] or rejects the request.

use crate::errors::FileError;
use axum::http::{HeaderMap, header};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// The resolved caller identity.
#[derive(Clone, Copy, Debug)]
pub struct Principal {
    pub user_id: Uuid,
}

/// Resolves `Authorization: Bearer <token>` against the sessions table.
#[derive(Clone)]
pub struct Authorizer {
    db: Arc<SqlitePool>,
}

impl Authorizer {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn authorize(&self, headers: &HeaderMap) -> Result<Principal, FileError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(FileError::Unauthorized)?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM sessions WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&*self.db)
        .await?
        .ok_or(FileError::Unauthorized)?;

        Ok(Principal { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{memory_pool, seed_session, seed_user};
    use axum::http::HeaderValue;
    use chrono::Duration;

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let db = memory_pool().await;
        let authorizer = Authorizer::new(db);
        let err = authorizer.authorize(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, FileError::Unauthorized));
    }

    #[tokio::test]
    async fn valid_token_resolves_principal() {
        let db = memory_pool().await;
        let user_id = seed_user(&db).await;
        let token = seed_session(&db, user_id).await;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let principal = Authorizer::new(db).authorize(&headers).await.unwrap();
        assert_eq!(principal.user_id, user_id);
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let db = memory_pool().await;
        let user_id = seed_user(&db).await;
        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(Utc::now() - Duration::hours(1))
            .execute(&*db)
            .await
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let err = Authorizer::new(db).authorize(&headers).await.unwrap_err();
        assert!(matches!(err, FileError::Unauthorized));
    }
}
