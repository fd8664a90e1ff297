//! Store policy lookup against the knowledge retriever.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use omnisupport_retrieval::Retriever;

use crate::actions::required_str;
use crate::context::CallerIdentity;
use crate::tools::Tool;

pub const NO_POLICY_FOUND: &str = "No relevant policy found.";

pub struct QueryPolicy {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl QueryPolicy {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }
}

#[async_trait]
impl Tool for QueryPolicy {
    fn name(&self) -> &'static str {
        "query_policy_rag"
    }

    fn description(&self) -> &'static str {
        "Look up store policy (returns, refunds, shipping, warranties) in \
         the policy manual. Always check here before promising policy terms."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Natural-language policy question."
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _caller: &CallerIdentity) -> String {
        let query = match required_str(&args, "query") {
            Ok(value) => value,
            Err(text) => return text,
        };

        let chunks = self.retriever.top_k(&query, self.top_k);
        if chunks.is_empty() {
            return NO_POLICY_FOUND.to_string();
        }

        chunks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use omnisupport_core::domain::user::UserId;
    use omnisupport_retrieval::{build_from_text, ChunkingParams};

    use crate::context::CallerIdentity;
    use crate::tools::Tool;

    use super::{QueryPolicy, NO_POLICY_FOUND};

    fn caller() -> CallerIdentity {
        CallerIdentity::new(UserId(1), "test@developer.com")
    }

    #[tokio::test]
    async fn relevant_policy_text_is_returned() {
        let retriever = build_from_text(
            "Non-Refundable: Sticker Pack items are final sale and cannot be returned. \
             Standard Shipping takes 5-7 business days.",
            ChunkingParams::default(),
        )
        .expect("corpus");
        let tool = QueryPolicy::new(Arc::new(retriever), 3);

        let text = tool.execute(json!({"query": "can I return a sticker pack?"}), &caller()).await;
        assert!(text.contains("Sticker Pack"), "{text}");
    }

    #[tokio::test]
    async fn missing_query_is_reported_as_text() {
        let retriever =
            build_from_text("anything", ChunkingParams::default()).expect("corpus");
        let tool = QueryPolicy::new(Arc::new(retriever), 0);

        let text = tool.execute(json!({}), &caller()).await;
        assert_eq!(text, "Error: missing required argument `query`.");

        let empty = tool.execute(json!({"query": "returns"}), &caller()).await;
        assert_eq!(empty, NO_POLICY_FOUND, "k = 0 yields the sentinel");
    }
}
