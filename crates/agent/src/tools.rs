//! Tool abstraction and registry.
//!
//! Every domain action implements [`Tool`]. Execution never returns an
//! `Err`: operational failures (not found, wrong state, database trouble)
//! come back as plain text so the reasoning policy can relay or recover.
//! The caller identity is injected by the orchestrator, never parsed from
//! the policy-supplied arguments.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::CallerIdentity;
use crate::llm::ToolSpec;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments the policy may supply.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, caller: &CallerIdentity) -> String;
}

/// Name-keyed catalog of the registered domain actions. Iteration order is
/// stable so the advertised tool list is deterministic.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// The catalog advertised to the reasoning policy on every step.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
