//! Tool-dispatch orchestrator: the loop between the reasoning policy and
//! the domain action library.
//!
//! One turn: append the user's message, then alternate policy steps and
//! tool dispatch until the policy speaks, or the round ceiling trips. Tool
//! batches run concurrently but their results are appended in request
//! order, so the recorded history is deterministic for a given set of
//! results. A failed policy step aborts the turn without appending any
//! assistant or tool residue; the user's own message stays committed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use thiserror::Error;
use tokio::time::timeout;

use omnisupport_core::config::AgentConfig;
use omnisupport_core::domain::conversation::{ThreadId, Turn, TurnRole};
use omnisupport_db::conversation::ConversationStore;
use omnisupport_db::repositories::RepositoryError;

use crate::context::{system_directive, CallerIdentity};
use crate::llm::{PolicyError, PolicyStep, ReasoningPolicy, ToolRequest};
use crate::tools::ToolRegistry;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("conversation store failure: {0}")]
    Store(#[from] RepositoryError),
    #[error("reasoning policy failure: {0}")]
    Policy(#[from] PolicyError),
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub thread_id: ThreadId,
    pub final_text: String,
    /// Names of every tool dispatched during the turn, in dispatch order.
    pub tools_invoked: Vec<String>,
}

pub struct Orchestrator {
    policy: Arc<dyn ReasoningPolicy>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    max_tool_rounds: u32,
    tool_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        policy: Arc<dyn ReasoningPolicy>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            policy,
            tools,
            store,
            max_tool_rounds: config.max_tool_rounds,
            tool_timeout: Duration::from_secs(config.tool_timeout_secs),
        }
    }

    pub async fn run_turn(
        &self,
        caller: &CallerIdentity,
        thread_id: &ThreadId,
        user_text: &str,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let system = system_directive(caller);
        let specs = self.tools.specs();

        let mut turns = self.store.snapshot(thread_id).await?;
        let ordinal = self.store.append(thread_id, TurnRole::User, user_text).await?;
        turns.push(local_turn(thread_id, ordinal, TurnRole::User, user_text));

        let mut tools_invoked = Vec::new();

        for round in 0..self.max_tool_rounds {
            let step = self.policy.step(&system, &turns, &specs).await?;

            let requests = match step {
                PolicyStep::Final(text) => {
                    self.store.append(thread_id, TurnRole::Assistant, &text).await?;
                    tracing::info!(
                        event_name = "agent.turn.completed",
                        thread_id = %thread_id,
                        rounds = round,
                        tools = tools_invoked.len(),
                    );
                    return Ok(TurnOutcome {
                        thread_id: thread_id.clone(),
                        final_text: text,
                        tools_invoked,
                    });
                }
                PolicyStep::ToolRequests(requests) if requests.is_empty() => {
                    return Err(PolicyError::Malformed(
                        "policy requested an empty tool batch".to_string(),
                    )
                    .into());
                }
                PolicyStep::ToolRequests(requests) => requests,
            };

            tracing::debug!(
                event_name = "agent.turn.tool_round",
                thread_id = %thread_id,
                round,
                batch = requests.len(),
            );

            // Concurrent dispatch; join_all keeps results in request order.
            let results =
                join_all(requests.iter().map(|request| self.dispatch(request, caller))).await;

            for (request, result) in requests.iter().zip(results) {
                tools_invoked.push(request.name.clone());
                let ordinal = self.store.append(thread_id, TurnRole::Tool, &result).await?;
                turns.push(local_turn(thread_id, ordinal, TurnRole::Tool, &result));
            }
        }

        // Round ceiling: close the turn honestly rather than looping on.
        tracing::warn!(
            event_name = "agent.turn.round_ceiling",
            thread_id = %thread_id,
            max_tool_rounds = self.max_tool_rounds,
        );
        let fallback = "I wasn't able to complete that request within the allowed number of \
                        steps. Here is what I found so far; please rephrase or narrow the \
                        request and I will try again."
            .to_string();
        self.store.append(thread_id, TurnRole::Assistant, &fallback).await?;
        Ok(TurnOutcome { thread_id: thread_id.clone(), final_text: fallback, tools_invoked })
    }

    async fn dispatch(&self, request: &ToolRequest, caller: &CallerIdentity) -> String {
        let Some(tool) = self.tools.get(&request.name) else {
            tracing::warn!(event_name = "agent.tool.unknown", tool = %request.name);
            return format!("Unknown tool `{}`.", request.name);
        };

        match timeout(self.tool_timeout, tool.execute(request.arguments.clone(), caller)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    event_name = "agent.tool.timeout",
                    tool = %request.name,
                    timeout_secs = self.tool_timeout.as_secs(),
                );
                format!(
                    "Tool `{}` timed out after {} seconds.",
                    request.name,
                    self.tool_timeout.as_secs()
                )
            }
        }
    }
}

/// Mirror of a just-appended turn for the in-memory context. The stored
/// row's timestamp may differ slightly; only role, content, and order
/// matter to the policy.
fn local_turn(thread_id: &ThreadId, ordinal: i64, role: TurnRole, content: &str) -> Turn {
    Turn {
        thread_id: thread_id.clone(),
        ordinal,
        role,
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use omnisupport_core::config::AgentConfig;
    use omnisupport_core::domain::conversation::{ThreadId, TurnRole};
    use omnisupport_core::domain::user::UserId;
    use omnisupport_db::connect_with_settings;
    use omnisupport_db::conversation::{ConversationStore, SqlConversationStore};
    use omnisupport_db::fixtures::DemoDataset;
    use omnisupport_db::migrations::run_pending;
    use omnisupport_db::repositories::{ReturnLabelRepository, SqlReturnLabelRepository};
    use omnisupport_db::DbPool;
    use omnisupport_retrieval::{build_from_text, ChunkingParams};

    use crate::actions::domain_registry;
    use crate::context::CallerIdentity;
    use crate::llm::{PolicyError, ScriptedPolicy, ToolRequest};

    use super::{Orchestrator, OrchestratorError};

    const POLICY_TEXT: &str =
        "Return Window: Customers may return items within 30 days of delivery. \
         Non-Refundable: Sticker Pack items are final sale and cannot be returned. \
         Standard Shipping: 5-7 business days.";

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        DemoDataset::load(&pool).await.expect("seed");
        pool
    }

    fn orchestrator(pool: &DbPool, policy: Arc<ScriptedPolicy>) -> Orchestrator {
        let retriever =
            build_from_text(POLICY_TEXT, ChunkingParams::default()).expect("corpus");
        let registry = domain_registry(pool.clone(), Arc::new(retriever), 3);
        let store = SqlConversationStore::new(pool.clone());
        let config = AgentConfig { max_tool_rounds: 6, tool_timeout_secs: 5 };
        Orchestrator::new(policy, Arc::new(registry), Arc::new(store), &config)
    }

    fn caller() -> CallerIdentity {
        CallerIdentity::new(UserId(1), "test@developer.com")
    }

    fn request(name: &str, args: serde_json::Value) -> ToolRequest {
        ToolRequest { name: name.to_string(), arguments: args }
    }

    #[tokio::test]
    async fn policy_question_flows_through_retrieval_into_the_final_answer() {
        let pool = seeded_pool().await;
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_tools(vec![request(
                    "query_policy_rag",
                    json!({"query": "can I return a sticker pack?"}),
                )])
                .then_final("Sticker Pack items are final sale and cannot be returned."),
        );
        let orchestrator = orchestrator(&pool, policy.clone());

        let thread = ThreadId("t-policy".to_string());
        let outcome = orchestrator
            .run_turn(&caller(), &thread, "Can I return my sticker pack?")
            .await
            .expect("turn");

        assert!(outcome.final_text.contains("final sale"));
        assert_eq!(outcome.tools_invoked, vec!["query_policy_rag"]);

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        assert_eq!(turns.len(), 3, "user, tool result, assistant");
        assert_eq!(turns[1].role, TurnRole::Tool);
        assert!(turns[1].content.contains("Sticker Pack"));

        // The second policy step must have seen the tool result.
        assert_eq!(policy.seen_turn_counts(), vec![1, 2]);
    }

    #[tokio::test]
    async fn cancellation_request_mutates_the_order_and_records_the_result() {
        let pool = seeded_pool().await;
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_tools(vec![request("cancel_order", json!({"order_id": "ORD-002"}))])
                .then_final("Done: order ORD-002 is cancelled."),
        );
        let orchestrator = orchestrator(&pool, policy);

        let thread = ThreadId("t-cancel".to_string());
        let outcome = orchestrator
            .run_turn(&caller(), &thread, "Please cancel ORD-002.")
            .await
            .expect("turn");
        assert!(outcome.final_text.contains("ORD-002"));

        let status: String =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = 'ORD-002'")
                .fetch_one(&pool)
                .await
                .expect("status");
        assert_eq!(status, "Cancelled");

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        assert!(turns[1].content.contains("Success: Order ORD-002 has been cancelled."));
    }

    #[tokio::test]
    async fn duplicate_ticket_round_echoes_the_surviving_ticket_id() {
        let pool = seeded_pool().await;
        let args = json!({"order_id": "ORD-001", "issue": "Left earcup is silent"});
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_tools(vec![request("file_ticket", args.clone())])
                .then_tools(vec![request("file_ticket", args)])
                .then_final("Your ticket is on file."),
        );
        let orchestrator = orchestrator(&pool, policy);

        let thread = ThreadId("t-ticket".to_string());
        orchestrator
            .run_turn(&caller(), &thread, "My headphones broke, file a ticket.")
            .await
            .expect("turn");

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        let first = &turns[1].content;
        let second = &turns[2].content;
        assert!(first.contains("filed successfully"), "{first}");
        assert!(second.contains("already exists"), "{second}");

        let id_of = |text: &str| {
            let start = text.find("TKT-").expect("ticket id");
            text[start..start + 14].to_string()
        };
        assert_eq!(id_of(first), id_of(second), "dedup must echo the first ticket's id");
    }

    #[tokio::test]
    async fn label_id_in_history_resolves_to_the_stored_label() {
        let pool = seeded_pool().await;
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_tools(vec![request(
                    "generate_return_label",
                    json!({"order_id": "ORD-001", "reason": "Defective"}),
                )])
                .then_final("Your return label is ready."),
        );
        let orchestrator = orchestrator(&pool, policy);

        let thread = ThreadId("t-label".to_string());
        orchestrator
            .run_turn(&caller(), &thread, "I need a return label for ORD-001.")
            .await
            .expect("turn");

        let store = SqlConversationStore::new(pool.clone());
        let turns = store.snapshot(&thread).await.expect("snapshot");
        let tool_text = &turns[1].content;
        let start = tool_text.find("LBL-").expect("label id recorded");
        let label_id = &tool_text[start..start + 14];

        let labels = SqlReturnLabelRepository::new(pool);
        let stored = labels.find_by_id(label_id).await.expect("lookup");
        assert!(stored.is_some(), "id recorded in history must resolve to a real label");
    }

    #[tokio::test]
    async fn batched_tool_results_are_recorded_in_request_order() {
        let pool = seeded_pool().await;
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_tools(vec![
                    request("search_item_details", json!({"item_name_query": "laptop"})),
                    request("query_policy_rag", json!({"query": "shipping time"})),
                ])
                .then_final("Both looked up."),
        );
        let orchestrator = orchestrator(&pool, policy);

        let thread = ThreadId("t-batch".to_string());
        let outcome = orchestrator
            .run_turn(&caller(), &thread, "Price a laptop and tell me about shipping.")
            .await
            .expect("turn");
        assert_eq!(outcome.tools_invoked, vec!["search_item_details", "query_policy_rag"]);

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        assert!(turns[1].content.contains("Gaming Laptop"), "first request's result first");
        assert!(turns[2].content.contains("Shipping"), "second request's result second");
    }

    #[tokio::test]
    async fn unknown_tool_names_come_back_as_text_for_the_policy() {
        let pool = seeded_pool().await;
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_tools(vec![request("drop_database", json!({}))])
                .then_final("That tool does not exist."),
        );
        let orchestrator = orchestrator(&pool, policy);

        let thread = ThreadId("t-unknown".to_string());
        orchestrator.run_turn(&caller(), &thread, "do something odd").await.expect("turn");

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        assert_eq!(turns[1].content, "Unknown tool `drop_database`.");
    }

    #[tokio::test]
    async fn round_ceiling_closes_the_turn_with_a_best_effort_message() {
        let pool = seeded_pool().await;
        let mut policy = ScriptedPolicy::new();
        for _ in 0..10 {
            policy = policy
                .then_tools(vec![request("query_policy_rag", json!({"query": "returns"}))]);
        }
        let policy = Arc::new(policy);

        let retriever =
            build_from_text(POLICY_TEXT, ChunkingParams::default()).expect("corpus");
        let registry = domain_registry(pool.clone(), Arc::new(retriever), 3);
        let store = SqlConversationStore::new(pool.clone());
        let config = AgentConfig { max_tool_rounds: 2, tool_timeout_secs: 5 };
        let orchestrator =
            Orchestrator::new(policy, Arc::new(registry), Arc::new(store), &config);

        let thread = ThreadId("t-ceiling".to_string());
        let outcome = orchestrator
            .run_turn(&caller(), &thread, "loop forever")
            .await
            .expect("turn still completes");

        assert!(outcome.final_text.contains("wasn't able to complete"));
        assert_eq!(outcome.tools_invoked.len(), 2, "exactly max_tool_rounds dispatches");

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        assert_eq!(turns.last().expect("turns").role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn timed_out_tool_is_recorded_as_text_and_the_turn_continues() {
        use std::time::Duration;

        use crate::tools::{Tool, ToolRegistry};

        struct SlowLookup;

        #[async_trait::async_trait]
        impl Tool for SlowLookup {
            fn name(&self) -> &'static str {
                "slow_lookup"
            }

            fn description(&self) -> &'static str {
                "Stub lookup that never finishes in time."
            }

            fn parameters_schema(&self) -> serde_json::Value {
                json!({"type": "object", "properties": {}})
            }

            async fn execute(&self, _args: serde_json::Value, _caller: &CallerIdentity) -> String {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "too late".to_string()
            }
        }

        let pool = seeded_pool().await;
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_tools(vec![request("slow_lookup", json!({}))])
                .then_final("The lookup did not answer in time."),
        );
        let mut registry = ToolRegistry::default();
        registry.register(SlowLookup);
        let store = SqlConversationStore::new(pool.clone());
        let config = AgentConfig { max_tool_rounds: 6, tool_timeout_secs: 1 };
        let orchestrator =
            Orchestrator::new(policy.clone(), Arc::new(registry), Arc::new(store), &config);

        let thread = ThreadId("t-timeout".to_string());
        let outcome = orchestrator
            .run_turn(&caller(), &thread, "look something up")
            .await
            .expect("turn still completes");
        assert_eq!(outcome.final_text, "The lookup did not answer in time.");
        assert_eq!(outcome.tools_invoked, vec!["slow_lookup"]);

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        assert_eq!(turns[1].role, TurnRole::Tool);
        assert_eq!(turns[1].content, "Tool `slow_lookup` timed out after 1 seconds.");

        // The policy must see the timeout text on its next step.
        assert_eq!(policy.seen_turn_counts(), vec![1, 2]);
    }

    #[tokio::test]
    async fn policy_failure_leaves_no_assistant_or_tool_residue() {
        let pool = seeded_pool().await;
        let policy = Arc::new(
            ScriptedPolicy::new()
                .then_error(PolicyError::Transport("connection refused".to_string())),
        );
        let orchestrator = orchestrator(&pool, policy);

        let thread = ThreadId("t-fail".to_string());
        let result = orchestrator.run_turn(&caller(), &thread, "hello?").await;
        assert!(matches!(result, Err(OrchestratorError::Policy(_))));

        let store = SqlConversationStore::new(pool);
        let turns = store.snapshot(&thread).await.expect("snapshot");
        assert_eq!(turns.len(), 1, "only the user's own message is committed");
        assert_eq!(turns[0].role, TurnRole::User);
    }
}
