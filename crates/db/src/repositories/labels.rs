use chrono::{DateTime, Utc};
use sqlx::Row;

use omnisupport_core::domain::label::{LabelStatus, ReturnLabel};
use omnisupport_core::domain::order::OrderId;

use super::{RepositoryError, ReturnLabelRepository};
use crate::DbPool;

pub struct SqlReturnLabelRepository {
    pool: DbPool,
}

impl SqlReturnLabelRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReturnLabelRepository for SqlReturnLabelRepository {
    async fn create(&self, label: ReturnLabel) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO return_labels (label_id, order_id, status, reason)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&label.label_id)
        .bind(&label.order_id.0)
        .bind(label.status.as_str())
        .bind(&label.reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, label_id: &str) -> Result<Option<ReturnLabel>, RepositoryError> {
        let row = sqlx::query(
            "SELECT label_id, order_id, status, reason, created_at
             FROM return_labels
             WHERE label_id = ?",
        )
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status_raw = row.get::<String, _>("status");
            let status = LabelStatus::parse(&status_raw).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown label status `{status_raw}`"))
            })?;
            Ok(ReturnLabel {
                label_id: row.get::<String, _>("label_id"),
                order_id: OrderId(row.get::<String, _>("order_id")),
                status,
                reason: row.get::<Option<String>, _>("reason"),
                created_at: row.get::<DateTime<Utc>, _>("created_at"),
            })
        })
        .transpose()
    }
}
