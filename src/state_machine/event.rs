//! Events that drive the orchestration loop

use crate::llm::{LlmError, LlmResponse};
use crate::tools::{ParseOutcome, ToolResult};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Model events
    ModelResponded {
        response: LlmResponse,
    },
    ModelFailed {
        error: LlmError,
        attempt: u32,
    },
    RetryElapsed {
        attempt: u32,
    },

    /// Parser verdict on the response being inspected
    Inspected {
        outcome: ParseOutcome,
    },

    // Tool events
    ToolCompleted {
        result: ToolResult,
    },

    /// The conversation refused an append
    ProtocolViolation {
        message: String,
    },

    Cancelled,
}
