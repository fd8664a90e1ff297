use chrono::{DateTime, Utc};
use sqlx::Row;

use omnisupport_core::domain::user::{User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_or_create_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        // Upsert keeps the first-authentication path a single round trip;
        // the no-op update lets RETURNING yield the existing row.
        let row = sqlx::query(
            "INSERT INTO users (email) VALUES (?)
             ON CONFLICT (email) DO UPDATE SET email = excluded.email
             RETURNING id, email, external_subject, full_name, created_at",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id: UserId(row.get::<i64, _>("id")),
            email: row.get::<String, _>("email"),
            external_subject: row.get::<Option<String>, _>("external_subject"),
            full_name: row.get::<Option<String>, _>("full_name"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        })
    }
}
