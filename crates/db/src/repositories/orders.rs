use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use omnisupport_core::domain::catalog::ItemId;
use omnisupport_core::domain::order::{Order, OrderId, OrderLine, OrderStatus};
use omnisupport_core::domain::user::UserId;

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT oi.item_id, i.name, oi.quantity, oi.unit_price
             FROM order_items oi
             JOIN items i ON i.id = oi.item_id
             WHERE oi.order_id = ?
             ORDER BY oi.id",
        )
        .bind(&order_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(OrderLine {
                    item_id: ItemId(row.get::<i64, _>("item_id")),
                    item_name: row.get::<String, _>("name"),
                    quantity: row.get::<i64, _>("quantity"),
                    unit_price: decode_decimal(row.get::<String, _>("unit_price"))?,
                })
            })
            .collect()
    }

    async fn hydrate(&self, row: sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
        let id = OrderId(row.get::<String, _>("order_id"));
        let lines = self.load_lines(&id).await?;
        Ok(Order {
            id,
            user_id: UserId(row.get::<i64, _>("user_id")),
            status: decode_status(row.get::<String, _>("status"))?,
            total_amount: decode_decimal(row.get::<String, _>("total_amount"))?,
            purchase_date: row.get::<DateTime<Utc>, _>("purchase_date"),
            lines,
        })
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT order_id, user_id, status, total_amount, purchase_date
             FROM orders
             WHERE user_id = ?
             ORDER BY purchase_date DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn find_owned(
        &self,
        order_id: &OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT order_id, user_id, status, total_amount, purchase_date
             FROM orders
             WHERE order_id = ? AND user_id = ?",
        )
        .bind(&order_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn set_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = ? WHERE order_id = ? AND status = ?")
            .bind(to.as_str())
            .bind(&order_id.0)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

pub(crate) fn decode_decimal(raw: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&raw)
        .map_err(|_| RepositoryError::Decode(format!("invalid decimal value `{raw}`")))
}

pub(crate) fn decode_status(raw: String) -> Result<OrderStatus, RepositoryError> {
    OrderStatus::parse(&raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{raw}`")))
}
