use chrono::{DateTime, Utc};
use sqlx::Row;

use omnisupport_core::domain::order::OrderId;
use omnisupport_core::domain::ticket::{Ticket, TicketStatus};
use omnisupport_core::domain::user::UserId;

use super::{RepositoryError, TicketInsert, TicketRepository};
use crate::DbPool;

pub struct SqlTicketRepository {
    pool: DbPool,
}

impl SqlTicketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TicketRepository for SqlTicketRepository {
    async fn find_open_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query(
            "SELECT ticket_id, user_id, order_id, issue, status, created_at
             FROM tickets
             WHERE order_id = ? AND status != 'Closed'",
        )
        .bind(&order_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_ticket).transpose()
    }

    async fn create(&self, ticket: Ticket) -> Result<TicketInsert, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO tickets (ticket_id, user_id, order_id, issue, status)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&ticket.ticket_id)
        .bind(ticket.user_id.0)
        .bind(&ticket.order_id.0)
        .bind(&ticket.issue)
        .bind(ticket.status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(TicketInsert::Created),
            Err(sqlx::Error::Database(db_error))
                if matches!(db_error.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                // A concurrent writer won the partial-index race; surface
                // the surviving open ticket instead of the violation.
                match self.find_open_for_order(&ticket.order_id).await? {
                    Some(existing) => Ok(TicketInsert::DuplicateOpen(existing)),
                    None => Err(RepositoryError::Database(sqlx::Error::Database(db_error))),
                }
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn decode_ticket(row: sqlx::sqlite::SqliteRow) -> Result<Ticket, RepositoryError> {
    let status_raw = row.get::<String, _>("status");
    let status = TicketStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown ticket status `{status_raw}`")))?;

    Ok(Ticket {
        ticket_id: row.get::<String, _>("ticket_id"),
        user_id: UserId(row.get::<i64, _>("user_id")),
        order_id: OrderId(row.get::<String, _>("order_id")),
        issue: row.get::<String, _>("issue"),
        status,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}
