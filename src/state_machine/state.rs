//! Orchestration loop state types

use crate::llm::LlmResponse;
use crate::tools::ToolCall;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Loop state
///
/// `round_trips` counts completed model → tool → model cycles. A batch of
/// calls from one response is a single round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    /// Model request in flight, with retry tracking
    AwaitingModel { attempt: u32, round_trips: u32 },

    /// Response received, looking for tool calls
    InspectingResponse {
        response: LlmResponse,
        round_trips: u32,
    },

    /// Executing tools serially
    DispatchingTool {
        current: ToolCall,
        remaining: Vec<ToolCall>,
        round_trips: u32,
    },

    /// Final answer produced
    Done {
        answer: String,
        /// Why a call-shaped answer was not treated as a call
        malformed_tool_call: Option<String>,
    },

    Failed { failure: LoopFailure },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done { .. } | LoopState::Failed { .. })
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LoopState::AwaitingModel { .. } => "awaiting_model",
            LoopState::InspectingResponse { .. } => "inspecting_response",
            LoopState::DispatchingTool { .. } => "dispatching_tool",
            LoopState::Done { .. } => "done",
            LoopState::Failed { .. } => "failed",
        }
    }

    pub fn round_trips(&self) -> Option<u32> {
        match self {
            LoopState::AwaitingModel { round_trips, .. }
            | LoopState::InspectingResponse { round_trips, .. }
            | LoopState::DispatchingTool { round_trips, .. } => Some(*round_trips),
            LoopState::Done { .. } | LoopState::Failed { .. } => None,
        }
    }
}

/// Which kind of problem ended a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Transient provider errors outlasted the retry budget
    ProviderUnavailable,
    /// Provider refused the request (auth, bad request, ...)
    ProviderRejected,
    /// Too many model ↔ tool round trips
    IterationLimit,
    /// Broken correlation or an impossible event sequence
    Protocol,
    Cancelled,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureCategory::ProviderUnavailable => "provider_unavailable",
            FailureCategory::ProviderRejected => "provider_rejected",
            FailureCategory::IterationLimit => "iteration_limit",
            FailureCategory::Protocol => "protocol",
            FailureCategory::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Structured failure handed to the caller of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{category}: {message}")]
pub struct LoopFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl LoopFailure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Per-session limits and identity (immutable while the loop runs)
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub session_id: String,
    pub model_id: String,
    /// Maximum tool round trips before the session fails
    pub max_iterations: u32,
    /// Retries after the first attempt for transient provider errors
    pub max_retries: u32,
    /// Backoff for the first retry; doubles on each further retry
    pub retry_base_delay: Duration,
}

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

impl LoopContext {
    pub fn new(session_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            model_id: model_id.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}
