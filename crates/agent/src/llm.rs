//! Reasoning-policy abstraction and the OpenAI-compatible implementation.
//!
//! A policy step is a pure function of the system directive, the ordered
//! turn snapshot, and the tool catalog. It yields exactly one of two
//! outcomes: a batch of tool requests, or final user-facing text. The
//! orchestrator never inspects provider payloads; everything
//! provider-specific stays behind [`ReasoningPolicy`].

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use omnisupport_core::config::LlmConfig;
use omnisupport_core::domain::conversation::{Turn, TurnRole};

#[derive(Clone, Debug, PartialEq)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Exactly one of: delegate to tools, or speak to the user.
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyStep {
    ToolRequests(Vec<ToolRequest>),
    Final(String),
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy transport failure: {0}")]
    Transport(String),
    #[error("policy returned a malformed completion: {0}")]
    Malformed(String),
    /// The client-side deadline elapsed before the provider answered.
    /// Not retried: every further attempt would spend the full deadline.
    #[error("policy call exceeded {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ReasoningPolicy: Send + Sync {
    async fn step(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<PolicyStep, PolicyError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
///
/// Temperature is pinned to zero so tool selection stays as repeatable as
/// the provider allows. Transport failures are retried with a short
/// backoff; malformed completions are not, since resending the same
/// context tends to reproduce them.
pub struct OpenAiChatPolicy {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
    timeout: Duration,
}

impl OpenAiChatPolicy {
    pub fn from_config(config: &LlmConfig) -> Result<Self, PolicyError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| PolicyError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            timeout,
        })
    }

    fn request_body(&self, system: &str, turns: &[Turn], tools: &[ToolSpec]) -> Value {
        let mut messages = vec![json!({"role": "system", "content": system})];
        for turn in turns {
            messages.push(render_turn(turn));
        }

        let tool_payload: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        json!({
            "model": self.model,
            "temperature": 0,
            "messages": messages,
            "tools": tool_payload,
        })
    }

    async fn post_completion(&self, body: &Value) -> Result<ChatCompletion, PolicyError> {
        let mut request =
            self.client.post(format!("{}/chat/completions", self.base_url)).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                PolicyError::Timeout(self.timeout)
            } else {
                PolicyError::Transport(error.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PolicyError::Transport(format!("http {status}: {detail}")));
        }

        response
            .json::<ChatCompletion>()
            .await
            .map_err(|error| PolicyError::Malformed(error.to_string()))
    }
}

#[async_trait]
impl ReasoningPolicy for OpenAiChatPolicy {
    async fn step(
        &self,
        system: &str,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> Result<PolicyStep, PolicyError> {
        let body = self.request_body(system, turns, tools);

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }

            match self.post_completion(&body).await {
                Ok(completion) => return parse_step(completion),
                Err(error @ PolicyError::Transport(_)) => {
                    tracing::warn!(
                        event_name = "agent.policy.retry",
                        attempt,
                        error = %error,
                        "policy transport failure"
                    );
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| PolicyError::Transport("no attempt made".to_string())))
    }
}

fn render_turn(turn: &Turn) -> Value {
    match turn.role {
        TurnRole::User => json!({"role": "user", "content": turn.content}),
        TurnRole::Assistant => json!({"role": "assistant", "content": turn.content}),
        // Tool results re-enter as user-role context. Turns carry no
        // provider call ids, so the strict tool-message shape is not
        // reconstructible from the log alone.
        TurnRole::Tool => {
            json!({"role": "user", "content": format!("Tool result:\n{}", turn.content)})
        }
    }
}

fn parse_step(completion: ChatCompletion) -> Result<PolicyStep, PolicyError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PolicyError::Malformed("completion has no choices".to_string()))?;

    let message = choice.message;
    if !message.tool_calls.is_empty() {
        let requests = message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = if call.function.arguments.trim().is_empty() {
                    Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&call.function.arguments).map_err(|error| {
                        PolicyError::Malformed(format!(
                            "tool call `{}` carries unparseable arguments: {error}",
                            call.function.name
                        ))
                    })?
                };
                Ok(ToolRequest { name: call.function.name, arguments })
            })
            .collect::<Result<Vec<_>, PolicyError>>()?;
        return Ok(PolicyStep::ToolRequests(requests));
    }

    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(PolicyStep::Final(content)),
        _ => Err(PolicyError::Malformed(
            "completion carries neither tool calls nor content".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

/// Deterministic policy for tests: replays a queued script of steps and
/// records how many turns it saw at each step.
#[derive(Default)]
pub struct ScriptedPolicy {
    script: Mutex<VecDeque<Result<PolicyStep, PolicyError>>>,
    seen_turn_counts: Mutex<Vec<usize>>,
}

impl ScriptedPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_tools(self, requests: Vec<ToolRequest>) -> Self {
        self.push(Ok(PolicyStep::ToolRequests(requests)));
        self
    }

    pub fn then_final(self, text: impl Into<String>) -> Self {
        self.push(Ok(PolicyStep::Final(text.into())));
        self
    }

    pub fn then_error(self, error: PolicyError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn seen_turn_counts(&self) -> Vec<usize> {
        self.seen_turn_counts.lock().expect("lock").clone()
    }

    fn push(&self, step: Result<PolicyStep, PolicyError>) {
        self.script.lock().expect("lock").push_back(step);
    }
}

#[async_trait]
impl ReasoningPolicy for ScriptedPolicy {
    async fn step(
        &self,
        _system: &str,
        turns: &[Turn],
        _tools: &[ToolSpec],
    ) -> Result<PolicyStep, PolicyError> {
        self.seen_turn_counts.lock().expect("lock").push(turns.len());
        self.script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(PolicyError::Malformed("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use omnisupport_core::config::LlmConfig;

    use super::{parse_step, ChatCompletion, OpenAiChatPolicy, PolicyError, PolicyStep, ReasoningPolicy};

    fn completion(payload: serde_json::Value) -> ChatCompletion {
        serde_json::from_value(payload).expect("completion shape")
    }

    #[test]
    fn content_without_tool_calls_is_final_text() {
        let step = parse_step(completion(json!({
            "choices": [{"message": {"content": "Your order has shipped."}}]
        })))
        .expect("parse");
        assert_eq!(step, PolicyStep::Final("Your order has shipped.".to_string()));
    }

    #[test]
    fn tool_calls_win_over_content() {
        let step = parse_step(completion(json!({
            "choices": [{"message": {
                "content": "",
                "tool_calls": [{"function": {
                    "name": "search_orders",
                    "arguments": "{\"order_id\": \"ORD-001\"}"
                }}]
            }}]
        })))
        .expect("parse");

        match step {
            PolicyStep::ToolRequests(requests) => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].name, "search_orders");
                assert_eq!(requests[0].arguments["order_id"], "ORD-001");
            }
            PolicyStep::Final(_) => panic!("expected tool requests"),
        }
    }

    #[test]
    fn empty_completion_is_malformed() {
        let result = parse_step(completion(json!({
            "choices": [{"message": {"content": "  "}}]
        })));
        assert!(matches!(result, Err(PolicyError::Malformed(_))));
    }

    #[test]
    fn unparseable_arguments_are_malformed() {
        let result = parse_step(completion(json!({
            "choices": [{"message": {
                "tool_calls": [{"function": {"name": "cancel_order", "arguments": "{not json"}}]
            }}]
        })));
        assert!(matches!(result, Err(PolicyError::Malformed(_))));
    }

    #[tokio::test]
    async fn unresponsive_endpoint_surfaces_as_a_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        // Accept the connection but never answer, so the client deadline
        // fires rather than a connect error.
        let silent = tokio::spawn(async move {
            let _connection = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let config = LlmConfig {
            api_key: None,
            base_url: format!("http://{addr}/v1"),
            model: "test-model".to_string(),
            timeout_secs: 1,
            max_retries: 0,
        };
        let policy = OpenAiChatPolicy::from_config(&config).expect("client");

        let result = policy.step("You are a test.", &[], &[]).await;
        match result {
            Err(PolicyError::Timeout(deadline)) => {
                assert_eq!(deadline, Duration::from_secs(1));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
        silent.abort();
    }
}
