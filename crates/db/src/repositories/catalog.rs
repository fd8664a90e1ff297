use sqlx::Row;

use omnisupport_core::domain::catalog::{Item, ItemId};

use super::{CatalogRepository, RepositoryError};
use crate::repositories::orders::decode_decimal;
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn search_by_name(
        &self,
        name_query: &str,
        limit: u32,
    ) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, current_price, category, stock_quantity
             FROM items
             WHERE lower(name) LIKE '%' || lower(?) || '%'
             ORDER BY name
             LIMIT ?",
        )
        .bind(name_query)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Item {
                    id: ItemId(row.get::<i64, _>("id")),
                    name: row.get::<String, _>("name"),
                    description: row.get::<Option<String>, _>("description"),
                    current_price: decode_decimal(row.get::<String, _>("current_price"))?,
                    category: row.get::<Option<String>, _>("category"),
                    stock_quantity: row.get::<i64, _>("stock_quantity"),
                })
            })
            .collect()
    }
}
