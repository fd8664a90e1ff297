//! Order lookup and cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use omnisupport_core::domain::order::{Order, OrderId, OrderStatus};
use omnisupport_core::errors::DomainError;
use omnisupport_db::repositories::OrderRepository;

use crate::actions::{optional_str, order_denied, required_str, storage_failure};
use crate::context::CallerIdentity;
use crate::tools::Tool;

/// Lists the caller's orders, or drills into one of them.
pub struct SearchOrders {
    orders: Arc<dyn OrderRepository>,
}

impl SearchOrders {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl Tool for SearchOrders {
    fn name(&self) -> &'static str {
        "search_orders"
    }

    fn description(&self) -> &'static str {
        "Look up the customer's orders. Pass order_id to fetch one specific \
         order; omit it to list all of the customer's orders."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "Optional exact order id, e.g. ORD-001."
                }
            }
        })
    }

    async fn execute(&self, args: Value, caller: &CallerIdentity) -> String {
        if let Some(order_id) = optional_str(&args, "order_id") {
            return match self.orders.find_owned(&OrderId(order_id.clone()), caller.user_id).await
            {
                Ok(Some(order)) => render_order(&order),
                Ok(None) => order_denied(&order_id),
                Err(error) => storage_failure(self.name(), &error),
            };
        }

        match self.orders.list_for_user(caller.user_id).await {
            Ok(orders) if orders.is_empty() => "You have no orders on file.".to_string(),
            Ok(orders) => {
                orders.iter().map(render_order).collect::<Vec<_>>().join("\n")
            }
            Err(error) => storage_failure(self.name(), &error),
        }
    }
}

/// Cancels a still-Processing order. Shipped and later orders go through
/// the return path instead.
pub struct CancelOrder {
    orders: Arc<dyn OrderRepository>,
}

impl CancelOrder {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl Tool for CancelOrder {
    fn name(&self) -> &'static str {
        "cancel_order"
    }

    fn description(&self) -> &'static str {
        "Cancel one of the customer's orders. Only orders still in \
         'Processing' can be cancelled. Confirm with the customer first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "Exact id of the order to cancel."
                }
            },
            "required": ["order_id"]
        })
    }

    async fn execute(&self, args: Value, caller: &CallerIdentity) -> String {
        let order_id = match required_str(&args, "order_id") {
            Ok(value) => value,
            Err(text) => return text,
        };

        let mut order =
            match self.orders.find_owned(&OrderId(order_id.clone()), caller.user_id).await {
                Ok(Some(order)) => order,
                Ok(None) => return order_denied(&order_id),
                Err(error) => return storage_failure(self.name(), &error),
            };

        if order.status == OrderStatus::Cancelled {
            return format!("Order with ID {order_id} has already been cancelled.");
        }

        match order.transition_to(OrderStatus::Cancelled) {
            Err(DomainError::InvalidOrderTransition { from, .. }) => {
                return format!(
                    "Cannot cancel order {order_id} because it is '{from}'. \
                     Only 'Processing' orders can be cancelled."
                );
            }
            Err(error) => return format!("Error: {error}"),
            Ok(()) => {}
        }

        // The transition is valid in memory; the guarded update makes the
        // same check authoritative against concurrent writers.
        match self
            .orders
            .set_status(&order.id, OrderStatus::Processing, OrderStatus::Cancelled)
            .await
        {
            Ok(true) => {
                tracing::info!(
                    event_name = "agent.action.order_cancelled",
                    order_id = %order.id,
                    user_id = caller.user_id.0,
                );
                format!("Success: Order {order_id} has been cancelled.")
            }
            Ok(false) => format!(
                "Cannot cancel order {order_id}: its status changed while \
                 processing your request. Please look it up again."
            ),
            Err(error) => storage_failure(self.name(), &error),
        }
    }
}

fn render_order(order: &Order) -> String {
    let lines = if order.lines.is_empty() {
        "(no line items)".to_string()
    } else {
        order
            .lines
            .iter()
            .map(|line| format!("{} (${}) x{}", line.item_name, line.unit_price, line.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Order {} [{}]: {} - Total: ${} ({})",
        order.id,
        order.purchase_date.format("%Y-%m-%d"),
        lines,
        order.total_amount,
        order.status,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use omnisupport_core::domain::user::UserId;
    use omnisupport_db::fixtures::DemoDataset;
    use omnisupport_db::migrations::run_pending;
    use omnisupport_db::repositories::SqlOrderRepository;
    use omnisupport_db::{connect_with_settings, DbPool};

    use crate::context::CallerIdentity;
    use crate::tools::Tool;

    use super::{CancelOrder, SearchOrders};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        DemoDataset::load(&pool).await.expect("seed");
        pool
    }

    fn caller() -> CallerIdentity {
        CallerIdentity::new(UserId(1), "test@developer.com")
    }

    #[tokio::test]
    async fn listing_shows_all_owned_orders_newest_first() {
        let pool = seeded_pool().await;
        let tool = SearchOrders::new(Arc::new(SqlOrderRepository::new(pool)));

        let text = tool.execute(json!({}), &caller()).await;
        let first = text.lines().next().expect("at least one order");
        assert!(first.contains("ORD-002"), "newest order first: {text}");
        assert!(text.contains("ORD-001"));
        assert!(text.contains("Wireless Headphones ($199.99) x1"));
    }

    #[tokio::test]
    async fn foreign_order_lookup_is_denied_without_leaking_existence() {
        let pool = seeded_pool().await;
        let tool = SearchOrders::new(Arc::new(SqlOrderRepository::new(pool)));

        let stranger = CallerIdentity::new(UserId(999), "other@example.com");
        let text = tool.execute(json!({"order_id": "ORD-001"}), &stranger).await;
        assert_eq!(text, "Order ORD-001 not found or you do not have access to view it.");
    }

    #[tokio::test]
    async fn processing_order_cancels_and_reports_success() {
        let pool = seeded_pool().await;
        let tool = CancelOrder::new(Arc::new(SqlOrderRepository::new(pool)));

        let text = tool.execute(json!({"order_id": "ORD-002"}), &caller()).await;
        assert_eq!(text, "Success: Order ORD-002 has been cancelled.");

        let again = tool.execute(json!({"order_id": "ORD-002"}), &caller()).await;
        assert_eq!(again, "Order with ID ORD-002 has already been cancelled.");
    }

    #[tokio::test]
    async fn shipped_order_cannot_be_cancelled() {
        let pool = seeded_pool().await;
        let tool = CancelOrder::new(Arc::new(SqlOrderRepository::new(pool)));

        let text = tool.execute(json!({"order_id": "ORD-001"}), &caller()).await;
        assert!(text.starts_with("Cannot cancel order ORD-001 because it is 'Shipped'"));
    }

    #[tokio::test]
    async fn missing_order_id_is_reported_as_text() {
        let pool = seeded_pool().await;
        let tool = CancelOrder::new(Arc::new(SqlOrderRepository::new(pool)));

        let text = tool.execute(json!({}), &caller()).await;
        assert_eq!(text, "Error: missing required argument `order_id`.");
    }
}
