//! Effects produced by state transitions

use crate::conversation::Message;
use crate::llm::LlmResponse;
use crate::tools::{ToolCall, ToolResult};
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append a message to the session's conversation
    AppendMessage { message: Message },

    /// Send the conversation to the model
    RequestModel,

    /// Wait, then ask the model again
    ScheduleRetry { delay: Duration, attempt: u32 },

    /// Run the parser over a response
    InspectResponse { response: LlmResponse },

    /// Execute one tool call
    DispatchTool { call: ToolCall },
}

impl Effect {
    pub fn append(message: Message) -> Self {
        Effect::AppendMessage { message }
    }

    pub fn append_tool_result(result: &ToolResult) -> Self {
        Effect::AppendMessage {
            message: result.to_message(),
        }
    }

    pub fn dispatch(call: ToolCall) -> Self {
        Effect::DispatchTool { call }
    }
}
