//! Extraction of tool calls from model responses
//!
//! Structured providers hand back typed `tool_use` blocks. Text-only
//! providers are asked to answer with a bare `{"name": .., "parameters": ..}`
//! object; we take everything from the first `{` to the last `}` and try
//! to decode that. Text that merely looks like an attempt is reported as
//! `Malformed` so the caller can log it, but it is still treated as a
//! plain answer.

use super::{SchemaValidationError, ToolCatalog, ToolInvocation};
use crate::llm::{LlmResponse, ToolCallMode};
use serde::Deserialize;
use serde_json::Value;

/// One tool call extracted from a response
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Correlation id linking the call to its result
    pub id: String,
    pub invocation: ToolInvocation,
    /// Set when the arguments already failed schema validation
    pub rejection: Option<SchemaValidationError>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, invocation: ToolInvocation) -> Self {
        Self {
            id: id.into(),
            invocation,
            rejection: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.invocation.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Plain answer
    NoInvocation,
    /// Something call-shaped that didn't decode; handled as a plain answer
    Malformed { reason: String },
    /// One or more calls, in the order the model emitted them
    Invocations(Vec<ToolCall>),
}

/// Shape of an embedded call
#[derive(Debug, Deserialize)]
struct EmbeddedCall {
    name: String,
    #[serde(alias = "arguments")]
    parameters: Value,
}

/// Parse a response according to how its provider returns tool calls
///
/// Calls naming a catalogued tool are checked against its schema here;
/// failures ride along on the call so dispatch can report them to the
/// model instead of running the tool.
pub fn parse_response(
    mode: ToolCallMode,
    response: &LlmResponse,
    catalog: &ToolCatalog,
) -> ParseOutcome {
    let outcome = match mode {
        ToolCallMode::Structured => parse_structured(response),
        ToolCallMode::EmbeddedText => parse_embedded(&response.text()),
    };

    match outcome {
        ParseOutcome::Invocations(calls) => ParseOutcome::Invocations(
            calls
                .into_iter()
                .map(|mut call| {
                    if catalog.descriptor(call.name()).is_some() {
                        call.rejection = catalog
                            .validate(call.name(), &call.invocation.arguments)
                            .err();
                    }
                    call
                })
                .collect(),
        ),
        other => other,
    }
}

fn parse_structured(response: &LlmResponse) -> ParseOutcome {
    let calls: Vec<ToolCall> = response
        .tool_uses()
        .into_iter()
        .map(|(id, name, input)| ToolCall::new(id, ToolInvocation::new(name, input.clone())))
        .collect();

    if calls.is_empty() {
        ParseOutcome::NoInvocation
    } else {
        ParseOutcome::Invocations(calls)
    }
}

/// Scan free text for an embedded call
pub fn parse_embedded(text: &str) -> ParseOutcome {
    let Some(candidate) = extract_embedded_object(text) else {
        // An opened object that never closes is most often truncated output
        if text.contains('{') {
            return ParseOutcome::Malformed {
                reason: "unterminated object".to_string(),
            };
        }
        return ParseOutcome::NoInvocation;
    };

    let call: EmbeddedCall = match serde_json::from_str(candidate) {
        Ok(call) => call,
        Err(e) => {
            return ParseOutcome::Malformed {
                reason: e.to_string(),
            }
        }
    };

    if call.name.trim().is_empty() {
        return ParseOutcome::Malformed {
            reason: "tool name is empty".to_string(),
        };
    }
    if !call.parameters.is_object() {
        return ParseOutcome::Malformed {
            reason: "parameters must be a JSON object".to_string(),
        };
    }

    let id = format!("call_{}", uuid::Uuid::new_v4().simple());
    ParseOutcome::Invocations(vec![ToolCall::new(
        id,
        ToolInvocation::new(call.name, call.parameters),
    )])
}

/// Substring from the first `{` through the last `}`, if there is one
pub fn extract_embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}
