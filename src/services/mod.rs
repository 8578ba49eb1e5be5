pub mod auth;
pub mod lifecycle;
pub mod object_store;
pub mod projects;
pub mod transfer;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, Utc};
    use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
    use std::sync::Arc;
    use uuid::Uuid;

    /// In-memory SQLite with the schema applied. One connection only, since
    /// each in-memory connection is its own database.
    pub async fn memory_pool() -> Arc<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        for stmt in crate::db::MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.expect("migration");
        }
        Arc::new(pool)
    }

    pub async fn seed_user(db: &SqlitePool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(format!("{id}@example.com"))
            .bind(Utc::now())
            .execute(db)
            .await
            .expect("seed user");
        id
    }

    pub async fn seed_session(db: &SqlitePool, user_id: Uuid) -> String {
        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(Utc::now() + Duration::hours(1))
            .execute(db)
            .await
            .expect("seed session");
        token
    }

    pub async fn seed_project(db: &SqlitePool, owner_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO projects (id, name, description, owner_id, created_at)
             VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(id)
        .bind("test project")
        .bind(owner_id)
        .bind(Utc::now())
        .execute(db)
        .await
        .expect("seed project");
        id
    }
}
