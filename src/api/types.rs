//! API request and response types

use crate::conversation::Message;
use crate::llm::ModelInfo;
use crate::runtime::SessionReport;
use crate::state_machine::LoopFailure;
use serde::{Deserialize, Serialize};

/// Run one question through a fresh session
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Done,
    Failed,
}

/// Outcome of a session plus the full transcript
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub session_id: String,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malformed_tool_call: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<LoopFailure>,
    pub messages: Vec<Message>,
    pub model_requests: usize,
    pub tool_dispatches: usize,
}

impl From<SessionReport> for QueryResponse {
    fn from(report: SessionReport) -> Self {
        let (status, answer, malformed_tool_call, error) = match report.outcome {
            Ok(done) => (
                QueryStatus::Done,
                Some(done.answer),
                done.malformed_tool_call,
                None,
            ),
            Err(failure) => (QueryStatus::Failed, None, None, Some(failure)),
        };
        Self {
            session_id: report.session_id,
            status,
            answer,
            malformed_tool_call,
            error,
            messages: report.conversation.messages().to_vec(),
            model_requests: report.model_requests,
            tool_dispatches: report.tool_dispatches,
        }
    }
}

/// Models response
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
