//! Return label issuance. Eligibility is asserted upstream through the
//! policy lookup and conversational confirmation; this action only mints
//! and records the label.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use omnisupport_core::domain::label::{LabelStatus, ReturnLabel};
use omnisupport_core::domain::order::OrderId;
use omnisupport_core::ids::new_label_id;
use omnisupport_db::repositories::{OrderRepository, ReturnLabelRepository};

use crate::actions::{optional_str, order_denied, required_str, storage_failure};
use crate::context::CallerIdentity;
use crate::tools::Tool;

const DEFAULT_REASON: &str = "Customer Request";

pub struct GenerateReturnLabel {
    orders: Arc<dyn OrderRepository>,
    labels: Arc<dyn ReturnLabelRepository>,
}

impl GenerateReturnLabel {
    pub fn new(orders: Arc<dyn OrderRepository>, labels: Arc<dyn ReturnLabelRepository>) -> Self {
        Self { orders, labels }
    }
}

#[async_trait]
impl Tool for GenerateReturnLabel {
    fn name(&self) -> &'static str {
        "generate_return_label"
    }

    fn description(&self) -> &'static str {
        "Generate a return shipping label for one of the customer's orders. \
         Check the return policy and confirm with the customer first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": {
                    "type": "string",
                    "description": "Exact id of the order being returned."
                },
                "reason": {
                    "type": "string",
                    "description": "Optional short reason for the return."
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
        let reason = optional_str(&args, "reason").unwrap_or_else(|| DEFAULT_REASON.to_string());

        let order_id = OrderId(order_id);
        match self.orders.find_owned(&order_id, caller.user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return order_denied(&order_id.0),
            Err(error) => return storage_failure(self.name(), &error),
        }

        let label = ReturnLabel {
            label_id: new_label_id(),
            order_id: order_id.clone(),
            status: LabelStatus::Generated,
            reason: Some(reason.clone()),
            created_at: Utc::now(),
        };

        match self.labels.create(label.clone()).await {
            Ok(()) => {
                tracing::info!(
                    event_name = "agent.action.label_generated",
                    label_id = %label.label_id,
                    order_id = %order_id,
                );
                format!(
                    "Return Label {} generated for order {order_id} (reason: {reason}). \
                     Attach this number to your package.",
                    label.label_id
                )
            }
            Err(error) => storage_failure(self.name(), &error),
        }
    }
}
