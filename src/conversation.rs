//! Per-session conversation history
//!
//! An append-only, role-tagged message log owned by exactly one session.
//! Appends are validated as a whole before anything is written, so a
//! rejected message never leaves a partial entry behind.

use crate::llm::{ContentBlock, LlmMessage, MessageRole};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

/// A single conversation entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
            tool_use_id: None,
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_use_id: None,
        }
    }

    pub fn tool_result(
        tool_use_id: impl Into<String>,
        output: impl Into<String>,
        is_error: bool,
    ) -> Self {
        let tool_use_id = tool_use_id.into();
        Self {
            role: Role::ToolResult,
            content: vec![ContentBlock::tool_result(
                tool_use_id.clone(),
                output,
                is_error,
            )],
            tool_use_id: Some(tool_use_id),
        }
    }

    /// Correlation ids of the tool calls this message requests
    pub fn requested_tool_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("tool result has no correlation id")]
    MissingToolUseId,
    #[error("tool result `{tool_use_id}` does not answer any requested tool call")]
    DanglingToolResult { tool_use_id: String },
    #[error("tool call `{tool_use_id}` already has a result")]
    DuplicateToolResult { tool_use_id: String },
    #[error("tool result `{tool_use_id}` carries a mismatched payload")]
    MismatchedPayload { tool_use_id: String },
}

/// Ordered message history for one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationState {
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the session with a system instruction
    pub fn with_system(system: impl Into<String>) -> Self {
        let system = system.into();
        Self {
            system: (!system.is_empty()).then_some(system),
            messages: Vec::new(),
        }
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append one message, or reject it without touching the history
    pub fn append(&mut self, message: Message) -> Result<(), ConversationError> {
        if message.role == Role::ToolResult {
            self.check_tool_result(&message)?;
        }
        self.messages.push(message);
        Ok(())
    }

    fn check_tool_result(&self, message: &Message) -> Result<(), ConversationError> {
        let tool_use_id = message
            .tool_use_id
            .as_deref()
            .ok_or(ConversationError::MissingToolUseId)?;

        let payload_matches = message.content.iter().all(|block| {
            matches!(block, ContentBlock::ToolResult { tool_use_id: id, .. } if id == tool_use_id)
        });
        if message.content.is_empty() || !payload_matches {
            return Err(ConversationError::MismatchedPayload {
                tool_use_id: tool_use_id.to_string(),
            });
        }

        let requested = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .any(|m| m.requested_tool_ids().any(|id| id == tool_use_id));
        if !requested {
            return Err(ConversationError::DanglingToolResult {
                tool_use_id: tool_use_id.to_string(),
            });
        }

        let answered = self
            .messages
            .iter()
            .any(|m| m.role == Role::ToolResult && m.tool_use_id.as_deref() == Some(tool_use_id));
        if answered {
            return Err(ConversationError::DuplicateToolResult {
                tool_use_id: tool_use_id.to_string(),
            });
        }

        Ok(())
    }

    /// Ids requested by assistant messages that still lack a result
    pub fn unanswered_tool_ids(&self) -> Vec<&str> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter_map(|m| m.tool_use_id.as_deref())
            .collect();
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(Message::requested_tool_ids)
            .filter(|id| !answered.contains(id))
            .collect()
    }

    /// Provider view of the history
    ///
    /// Tool results travel as user turns; consecutive results are merged
    /// into a single turn because providers expect strict alternation.
    pub fn to_llm_messages(&self) -> Vec<LlmMessage> {
        let mut out: Vec<LlmMessage> = Vec::with_capacity(self.messages.len());
        let mut previous: Option<Role> = None;

        for msg in &self.messages {
            match msg.role {
                Role::ToolResult if previous == Some(Role::ToolResult) => {
                    if let Some(last) = out.last_mut() {
                        last.content.extend(msg.content.iter().cloned());
                    }
                }
                role => out.push(LlmMessage {
                    role: match role {
                        Role::Assistant => MessageRole::Assistant,
                        Role::User | Role::ToolResult => MessageRole::User,
                    },
                    content: msg.content.clone(),
                }),
            }
            previous = Some(msg.role);
        }

        out
    }
}
