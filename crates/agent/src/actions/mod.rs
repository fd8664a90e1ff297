//! The domain action library: the six operations the reasoning policy may
//! take against the store on the customer's behalf.
//!
//! Every action reports outcomes, including failures, as plain text; the
//! policy is expected to relay or work around them. Ownership scoping is
//! structural: actions query with the injected caller's user id and never
//! trust an identifier the policy supplies for another customer.

use std::sync::Arc;

use serde_json::Value;

use omnisupport_db::repositories::{
    RepositoryError, SqlCatalogRepository, SqlOrderRepository, SqlReturnLabelRepository,
    SqlTicketRepository,
};
use omnisupport_db::DbPool;
use omnisupport_retrieval::Retriever;

use crate::tools::ToolRegistry;

pub mod catalog;
pub mod labels;
pub mod orders;
pub mod policy;
pub mod tickets;

pub use catalog::SearchItemDetails;
pub use labels::GenerateReturnLabel;
pub use orders::{CancelOrder, SearchOrders};
pub use policy::QueryPolicy;
pub use tickets::FileTicket;

/// Wires the full action library against a live database pool and a built
/// retriever. Tests assemble registries by hand instead.
pub fn domain_registry(
    pool: DbPool,
    retriever: Arc<dyn Retriever>,
    policy_top_k: usize,
) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(SearchOrders::new(Arc::new(SqlOrderRepository::new(pool.clone()))));
    registry.register(CancelOrder::new(Arc::new(SqlOrderRepository::new(pool.clone()))));
    registry.register(SearchItemDetails::new(Arc::new(SqlCatalogRepository::new(pool.clone()))));
    registry.register(FileTicket::new(
        Arc::new(SqlOrderRepository::new(pool.clone())),
        Arc::new(SqlTicketRepository::new(pool.clone())),
    ));
    registry.register(GenerateReturnLabel::new(
        Arc::new(SqlOrderRepository::new(pool.clone())),
        Arc::new(SqlReturnLabelRepository::new(pool)),
    ));
    registry.register(QueryPolicy::new(retriever, policy_top_k));
    registry
}

/// Pulls a required string argument, or the text the policy should see.
pub(crate) fn required_str(args: &Value, key: &str) -> Result<String, String> {
    match args.get(key).and_then(Value::as_str).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(format!("Error: missing required argument `{key}`.")),
    }
}

pub(crate) fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Uniform denial for an order that is absent or belongs to someone else.
/// The two cases are deliberately indistinguishable.
pub(crate) fn order_denied(order_id: &str) -> String {
    format!("Order {order_id} not found or you do not have access to view it.")
}

pub(crate) fn storage_failure(action: &str, error: &RepositoryError) -> String {
    tracing::error!(event_name = "agent.action.storage_failure", action, error = %error);
    if error.is_pool_exhausted() {
        "The system is briefly overloaded. Please try that again in a moment.".to_string()
    } else {
        "An internal error occurred while accessing your records. Please try again later."
            .to_string()
    }
}
