//! Support ticket filing, with one-open-ticket-per-order dedup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use omnisupport_core::domain::order::OrderId;
use omnisupport_core::domain::ticket::{Ticket, TicketStatus};
use omnisupport_core::ids::new_ticket_id;
use omnisupport_db::repositories::{OrderRepository, TicketInsert, TicketRepository};

use crate::actions::{order_denied, required_str, storage_failure};
use crate::context::CallerIdentity;
use crate::tools::Tool;

pub struct FileTicket {
    orders: Arc<dyn OrderRepository>,
    tickets: Arc<dyn TicketRepository>,
}

impl FileTicket {
    pub fn new(orders: Arc<dyn OrderRepository>, tickets: Arc<dyn TicketRepository>) -> Self {
        Self { orders, tickets }
    }
}

#[async_trait]
impl Tool for FileTicket {
    fn name(&self) -> &'static str {
        "file_ticket"
    }

    fn description(&self) -> &'static str {
        "File a support ticket about one of the customer's orders. Each \
         order can have at most one ticket open at a time."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "Exact id of the affected order."
                },
                "issue": {
                    "type": "string",
                    "description": "The customer's description of the problem."
                }
            },
            "required": ["order_id", "issue"]
        })
    }

    async fn execute(&self, args: Value, caller: &CallerIdentity) -> String {
        let order_id = match required_str(&args, "order_id") {
            Ok(value) => value,
            Err(text) => return text,
        };
        let issue = match required_str(&args, "issue") {
            Ok(value) => value,
            Err(text) => return text,
        };

        // Ownership gate comes first so an unowned order id leaks nothing
        // about whether a ticket exists on it.
        let order_id = OrderId(order_id);
        match self.orders.find_owned(&order_id, caller.user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return order_denied(&order_id.0),
            Err(error) => return storage_failure(self.name(), &error),
        }

        let ticket = Ticket {
            ticket_id: new_ticket_id(),
            user_id: caller.user_id,
            order_id: order_id.clone(),
            issue: issue.clone(),
            status: TicketStatus::Open,
            created_at: Utc::now(),
        };

        // The partial unique index on open tickets is the authoritative
        // dedup check; concurrent duplicates surface as DuplicateOpen.
        match self.tickets.create(ticket.clone()).await {
            Ok(TicketInsert::Created) => {
                tracing::info!(
                    event_name = "agent.action.ticket_filed",
                    ticket_id = %ticket.ticket_id,
                    order_id = %order_id,
                );
                format!(
                    "Ticket {} filed successfully!\nIssue logged: {issue}\n\
                     Support will review it within 24 hours.",
                    ticket.ticket_id
                )
            }
            Ok(TicketInsert::DuplicateOpen(existing)) => format!(
                "Ticket ({}) already exists for this order. \
                 Support will review it within 24 hours.",
                existing.ticket_id
            ),
            Err(error) => storage_failure(self.name(), &error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use omnisupport_core::domain::user::UserId;
    use omnisupport_db::connect_with_settings;
    use omnisupport_db::fixtures::DemoDataset;
    use omnisupport_db::migrations::run_pending;
    use omnisupport_db::repositories::{SqlOrderRepository, SqlTicketRepository};

    use crate::context::CallerIdentity;
    use crate::tools::Tool;

    use super::FileTicket;

    async fn tool() -> FileTicket {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        DemoDataset::load(&pool).await.expect("seed");
        FileTicket::new(
            Arc::new(SqlOrderRepository::new(pool.clone())),
            Arc::new(SqlTicketRepository::new(pool)),
        )
    }

    fn caller() -> CallerIdentity {
        CallerIdentity::new(UserId(1), "test@developer.com")
    }

    fn ticket_id_from(text: &str) -> String {
        let start = text.find("TKT-").expect("ticket id in response");
        text[start..start + 14].to_string()
    }

    #[tokio::test]
    async fn first_ticket_files_and_second_returns_the_survivor() {
        let tool = tool().await;
        let args = json!({"order_id": "ORD-001", "issue": "Left earcup is silent"});

        let first = tool.execute(args.clone(), &caller()).await;
        assert!(first.contains("filed successfully"), "{first}");
        assert!(first.contains("Issue logged: Left earcup is silent"));
        let filed_id = ticket_id_from(&first);

        let second = tool.execute(args, &caller()).await;
        assert!(second.contains("already exists"), "{second}");
        assert_eq!(ticket_id_from(&second), filed_id, "must echo the pre-existing id");
    }

    #[tokio::test]
    async fn unowned_order_is_denied_before_any_ticket_checks() {
        let tool = tool().await;
        let stranger = CallerIdentity::new(UserId(999), "other@example.com");

        let text = tool
            .execute(json!({"order_id": "ORD-001", "issue": "broken"}), &stranger)
            .await;
        assert_eq!(text, "Order ORD-001 not found or you do not have access to view it.");
    }

    #[tokio::test]
    async fn missing_issue_is_reported_as_text() {
        let tool = tool().await;

        let text = tool.execute(json!({"order_id": "ORD-001"}), &caller()).await;
        assert_eq!(text, "Error: missing required argument `issue`.");
    }
}
