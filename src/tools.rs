//! Tool catalog, invocation parsing and dispatch
//!
//! Tools are stateless; everything a call needs arrives through
//! `ToolContext`. The catalog is populated once from a `ToolProvider`
//! before any session starts and is only read afterwards.

mod catalog;
mod dispatcher;
mod email_age;
mod parser;
mod provider;
mod think;

#[allow(unused_imports)] // Public API re-exports
pub use catalog::{CatalogError, SchemaValidationError, ToolCatalog, ToolHandler};
pub use dispatcher::{CancelPolicy, DispatchOptions, ToolDispatcher};
pub use email_age::EmailAgeTool;
#[allow(unused_imports)] // Public API re-exports
pub use parser::{extract_embedded_object, parse_response, ParseOutcome, ToolCall};
pub use provider::{LocalToolProvider, ProviderHandler, ToolProvider};
pub use think::ThinkTool;

use crate::conversation::Message;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error raised by a tool body or a tool provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Failed(String),
    #[error("tool unavailable: {0}")]
    Unavailable(String),
}

/// A request to run one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// What came back from a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

/// Outcome of one dispatched call, ready to be appended to the conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub invocation: ToolInvocation,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(tool_use_id: impl Into<String>, invocation: ToolInvocation, value: Value) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            invocation,
            outcome: ToolOutcome::Success(value),
        }
    }

    pub fn failure(
        tool_use_id: impl Into<String>,
        invocation: ToolInvocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            invocation,
            outcome: ToolOutcome::Failure(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// Text the model sees for this result
    pub fn output_text(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success(Value::String(s)) => s.clone(),
            ToolOutcome::Success(value) => value.to_string(),
            ToolOutcome::Failure(message) => format!("Error: {message}"),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.tool_use_id, self.output_text(), !self.is_success())
    }
}

/// All context needed for a tool invocation.
///
/// Created fresh for each tool call. Tools should be stateless and derive
/// all context from this struct.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Cancellation signal for long-running operations
    pub cancel: CancellationToken,

    /// The session this tool is executing within
    pub session_id: String,

    /// Correlation id of the call being served
    pub tool_use_id: String,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken, session_id: String, tool_use_id: String) -> Self {
        Self {
            cancel,
            session_id,
            tool_use_id,
        }
    }
}

/// Trait for tools served in-process
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool
    ///
    /// Long-running tools should watch `ctx.cancel` and stop early when it
    /// fires.
    async fn run(&self, input: Value, ctx: ToolContext) -> Result<Value, ToolError>;
}
