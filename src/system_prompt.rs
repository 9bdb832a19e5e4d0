//! System prompt construction
//!
//! Structured providers receive tool definitions through their API, so the
//! prompt only sets expectations. Text-only providers learn about every
//! tool and the exact call format from the prompt itself.

use crate::llm::{ToolCallMode, ToolDescriptor};
use std::fmt::Write;

/// Base system prompt establishing the assistant's role
const BASE_PROMPT: &str = r"You are a helpful assistant with access to tools. Use a tool only when it is needed to answer the user's question; otherwise answer directly.

When a tool result comes back, use it to answer the user's original question. If a tool reports an error, correct the call or explain the problem.";

/// Call format for providers without native tool calling
const EMBEDDED_CALL_FORMAT: &str = r#"To call a tool, respond with ONLY a JSON object in this format, with no other text and no backticks:
{"name": "<tool name>", "parameters": {"<parameter>": <value>}}

Call at most one tool per response. To answer without a tool, respond with plain text."#;

/// Build the system prompt for a provider's tool-call mode
pub fn build_system_prompt(mode: ToolCallMode, tools: &[ToolDescriptor]) -> String {
    let mut prompt = BASE_PROMPT.to_string();

    if mode == ToolCallMode::EmbeddedText && !tools.is_empty() {
        prompt.push_str("\n\nAvailable tools:\n");
        for tool in tools {
            let _ = writeln!(prompt, "\n- {}: {}", tool.name, tool.description);
            let _ = writeln!(prompt, "  Parameters schema: {}", tool.input_schema);
        }
        prompt.push('\n');
        prompt.push_str(EMBEDDED_CALL_FORMAT);
    }

    prompt
}
