use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use omnisupport_core::domain::conversation::{Thread, ThreadId, Turn, TurnRole};
use omnisupport_core::domain::user::UserId;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Append-only, thread-keyed log of turns. The ordered turn sequence is the
/// entire recoverable state of a conversation; there is no separate memory
/// structure. Prior turns are never reordered or mutated.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends in strict ordinal order and returns the assigned ordinal.
    /// A thread with no existing turns is implicitly created by its first
    /// append; the threads metadata row is a separate, advisory concern.
    async fn append(
        &self,
        thread_id: &ThreadId,
        role: TurnRole,
        content: &str,
    ) -> Result<i64, RepositoryError>;

    /// Full ordered history, used to resume a conversation and to
    /// reconstruct reasoning-policy context on every new turn.
    async fn snapshot(&self, thread_id: &ThreadId) -> Result<Vec<Turn>, RepositoryError>;

    async fn create_thread(&self, user_id: UserId, title: &str)
        -> Result<Thread, RepositoryError>;

    async fn list_threads(&self, user_id: UserId) -> Result<Vec<Thread>, RepositoryError>;

    /// Returns false when the thread metadata row does not exist.
    async fn rename_thread(
        &self,
        thread_id: &ThreadId,
        title: &str,
    ) -> Result<bool, RepositoryError>;
}

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for SqlConversationStore {
    async fn append(
        &self,
        thread_id: &ThreadId,
        role: TurnRole,
        content: &str,
    ) -> Result<i64, RepositoryError> {
        // The ordinal is computed inside the INSERT so the UNIQUE
        // (thread_id, ordinal) constraint is the ordering authority.
        // Interleaved appends to the same thread are not protected; a
        // thread is driven by one logical client at a time.
        let row = sqlx::query(
            "INSERT INTO turns (thread_id, ordinal, role, content)
             VALUES (?, (SELECT COALESCE(MAX(ordinal) + 1, 0) FROM turns WHERE thread_id = ?), ?, ?)
             RETURNING ordinal",
        )
        .bind(&thread_id.0)
        .bind(&thread_id.0)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("ordinal"))
    }

    async fn snapshot(&self, thread_id: &ThreadId) -> Result<Vec<Turn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT thread_id, ordinal, role, content, created_at
             FROM turns
             WHERE thread_id = ?
             ORDER BY ordinal",
        )
        .bind(&thread_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let role_raw = row.get::<String, _>("role");
                let role = TurnRole::parse(&role_raw).ok_or_else(|| {
                    RepositoryError::Decode(format!("unknown turn role `{role_raw}`"))
                })?;
                Ok(Turn {
                    thread_id: ThreadId(row.get::<String, _>("thread_id")),
                    ordinal: row.get::<i64, _>("ordinal"),
                    role,
                    content: row.get::<String, _>("content"),
                    created_at: row.get::<DateTime<Utc>, _>("created_at"),
                })
            })
            .collect()
    }

    async fn create_thread(
        &self,
        user_id: UserId,
        title: &str,
    ) -> Result<Thread, RepositoryError> {
        let thread_id = omnisupport_core::ids::new_thread_id();
        let row = sqlx::query(
            "INSERT INTO threads (thread_id, user_id, title)
             VALUES (?, ?, ?)
             RETURNING thread_id, user_id, title, created_at",
        )
        .bind(&thread_id)
        .bind(user_id.0)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(decode_thread(row))
    }

    async fn list_threads(&self, user_id: UserId) -> Result<Vec<Thread>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT thread_id, user_id, title, created_at
             FROM threads
             WHERE user_id = ?
             ORDER BY created_at DESC, thread_id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(decode_thread).collect())
    }

    async fn rename_thread(
        &self,
        thread_id: &ThreadId,
        title: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE threads SET title = ? WHERE thread_id = ?")
            .bind(title)
            .bind(&thread_id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn decode_thread(row: sqlx::sqlite::SqliteRow) -> Thread {
    Thread {
        thread_id: ThreadId(row.get::<String, _>("thread_id")),
        user_id: UserId(row.get::<i64, _>("user_id")),
        title: row.get::<String, _>("title"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    }
}
