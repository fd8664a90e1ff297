use sqlx::Row;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Deterministic demo dataset: one principal, five catalog items (two out
/// of stock), one aged Shipped order and one fresh Processing order. Used
/// by the `seed` CLI command and by repository tests.
pub struct DemoDataset;

const SEED_SQL: &str = r#"
INSERT INTO users (email, external_subject, full_name)
VALUES ('test@developer.com', 'dev_master', 'Developer Account')
ON CONFLICT (email) DO NOTHING;

INSERT INTO items (name, description, current_price, category, stock_quantity) VALUES
  ('Wireless Headphones', 'Noise cancelling over-ear headphones', '199.99', 'Electronics', 100),
  ('Protection Case', 'Hard shell case for headphones', '49.99', 'Accessories', 0),
  ('Gaming Laptop', 'RTX 4060, 16GB RAM, 1TB SSD', '1200.00', 'Computers', 100),
  ('Mechanical Keyboard', 'RGB Backlit, Blue Switches', '89.99', 'Electronics', 100),
  ('USB-C Cable', '2 Meter fast charging cable', '19.99', 'Accessories', 0)
ON CONFLICT (name) DO UPDATE SET current_price = excluded.current_price;

INSERT INTO orders (order_id, user_id, status, total_amount, purchase_date)
SELECT 'ORD-001', u.id, 'Shipped', '249.98', datetime('now', '-45 days')
FROM users u WHERE u.email = 'test@developer.com'
ON CONFLICT DO NOTHING;

INSERT INTO order_items (order_id, item_id, quantity, unit_price)
SELECT 'ORD-001', i.id, 1, '199.99' FROM items i WHERE i.name = 'Wireless Headphones'
  AND NOT EXISTS (SELECT 1 FROM order_items WHERE order_id = 'ORD-001');

INSERT INTO order_items (order_id, item_id, quantity, unit_price)
SELECT 'ORD-001', i.id, 1, '49.99' FROM items i WHERE i.name = 'Protection Case'
  AND NOT EXISTS (
    SELECT 1 FROM order_items oi JOIN items it ON it.id = oi.item_id
    WHERE oi.order_id = 'ORD-001' AND it.name = 'Protection Case'
  );

INSERT INTO orders (order_id, user_id, status, total_amount, purchase_date)
SELECT 'ORD-002', u.id, 'Processing', '1200.00', datetime('now')
FROM users u WHERE u.email = 'test@developer.com'
ON CONFLICT DO NOTHING;

INSERT INTO order_items (order_id, item_id, quantity, unit_price)
SELECT 'ORD-002', i.id, 1, '1200.00' FROM items i WHERE i.name = 'Gaming Laptop'
  AND NOT EXISTS (SELECT 1 FROM order_items WHERE order_id = 'ORD-002');
"#;

#[derive(Debug)]
pub struct SeedSummary {
    pub users: i64,
    pub items: i64,
    pub orders: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl DemoDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
        let mut tx = pool.begin().await?;
        for statement in SEED_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        let summary = SeedSummary {
            users: count(pool, "users").await?,
            items: count(pool, "items").await?,
            orders: count(pool, "orders").await?,
        };
        Ok(summary)
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let checks = vec![
            ("demo-user", count(pool, "users").await? >= 1),
            ("catalog-items", count(pool, "items").await? == 5),
            ("orders", count(pool, "orders").await? == 2),
            ("order-lines", count(pool, "order_items").await? == 3),
        ];
        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count(pool: &DbPool, table: &str) -> Result<i64, RepositoryError> {
    // Table names come from the fixed check list above, never from input.
    let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(row.get::<i64, _>("count"))
}

#[cfg(test)]
mod tests {
    use crate::connect_with_settings;
    use crate::migrations::run_pending;

    use super::DemoDataset;

    #[tokio::test]
    async fn seed_is_idempotent_and_verifiable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");

        let first = DemoDataset::load(&pool).await.expect("seed");
        assert_eq!(first.items, 5);
        assert_eq!(first.orders, 2);

        // Re-seeding must not duplicate rows.
        let second = DemoDataset::load(&pool).await.expect("re-seed");
        assert_eq!(second.items, 5);
        assert_eq!(second.orders, 2);

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
    }
}
