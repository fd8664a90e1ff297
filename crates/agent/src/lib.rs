//! The support agent: a reasoning policy wired to a library of domain
//! actions through a tool-dispatch orchestrator.
//!
//! The orchestrator owns the loop; the reasoning policy only ever sees the
//! conversation snapshot and the tool catalog, and only ever answers with
//! either tool requests or final text. Domain actions carry their own
//! authorization scope via [`context::CallerIdentity`], which is injected
//! out-of-band and never taken from policy-supplied arguments.

pub mod actions;
pub mod context;
pub mod llm;
pub mod orchestrator;
pub mod tools;

pub use context::CallerIdentity;
pub use llm::{PolicyError, PolicyStep, ReasoningPolicy, ScriptedPolicy, ToolRequest, ToolSpec};
pub use orchestrator::{Orchestrator, OrchestratorError, TurnOutcome};
pub use tools::{Tool, ToolRegistry};
