//! Catalog search. The catalog is public: no ownership scoping applies.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use omnisupport_db::repositories::CatalogRepository;

use crate::actions::{required_str, storage_failure};
use crate::context::CallerIdentity;
use crate::tools::Tool;

const RESULT_LIMIT: u32 = 5;

pub struct SearchItemDetails {
    catalog: Arc<dyn CatalogRepository>,
}

impl SearchItemDetails {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for SearchItemDetails {
    fn name(&self) -> &'static str {
        "search_item_details"
    }

    fn description(&self) -> &'static str {
        "Search the product catalog by name. Returns price, category, \
         description and stock availability for matching items."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "item_name_query": {
                    "type": "string",
                    "description": "Partial or full item name, e.g. 'headphones'."
                }
            },
            "required": ["item_name_query"]
        })
    }

    async fn execute(&self, args: Value, _caller: &CallerIdentity) -> String {
        let query = match required_str(&args, "item_name_query") {
            Ok(value) => value,
            Err(text) => return text,
        };

        let items = match self.catalog.search_by_name(&query, RESULT_LIMIT).await {
            Ok(items) => items,
            Err(error) => return storage_failure(self.name(), &error),
        };

        if items.is_empty() {
            return format!(
                "We do not have any items matching '{query}'. Please try a different keyword."
            );
        }

        items
            .iter()
            .map(|item| {
                let stock_flag = if item.is_out_of_stock() { " [OUT OF STOCK]" } else { "" };
                format!(
                    "• {} (${}){}\n  Category: {}\n  Info: {}",
                    item.name,
                    item.current_price,
                    stock_flag,
                    item.category.as_deref().unwrap_or("Uncategorized"),
                    item.description.as_deref().unwrap_or("No description available."),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
