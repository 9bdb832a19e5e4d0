//! Ollama provider implementation
//!
//! Embedded-text mode: the model has no tool-calling API, so tools are
//! described in the system prompt and the model answers with a bare JSON
//! object when it wants one called.

use super::types::{
    ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, ToolCallMode, Usage,
};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Ollama service implementation
pub struct OllamaService {
    client: Client,
    base_url: String,
    api_name: String,
    model_id: String,
}

impl OllamaService {
    pub fn new(host: &str, api_name: &str, model_id: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/api/chat", host.trim_end_matches('/')),
            api_name: api_name.to_string(),
            model_id: model_id.to_string(),
        })
    }
}

pub(super) fn translate_request(api_name: &str, request: &LlmRequest) -> OllamaRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    let system: Vec<&str> = request.system.iter().map(|s| s.text.as_str()).collect();
    if !system.is_empty() {
        messages.push(OllamaMessage {
            role: "system".to_string(),
            content: system.join("\n\n"),
        });
    }

    messages.extend(request.messages.iter().map(translate_message));

    OllamaRequest {
        model: api_name.to_string(),
        messages,
        stream: false,
        options: request.max_tokens.map(|n| OllamaOptions { num_predict: n }),
    }
}

pub(super) fn translate_message(msg: &LlmMessage) -> OllamaMessage {
    let role = match msg.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };

    let has_text = msg
        .content
        .iter()
        .any(|block| matches!(block, ContentBlock::Text { .. }));

    let parts: Vec<String> = msg
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.clone()),
            // The raw assistant text already contains the call; only
            // re-render it when the text is missing.
            ContentBlock::ToolUse { name, input, .. } if !has_text => {
                Some(json!({ "name": name, "parameters": input }).to_string())
            }
            ContentBlock::ToolUse { .. } => None,
            ContentBlock::ToolResult {
                content, is_error, ..
            } => Some(if *is_error {
                format!("The tool call failed: {content}")
            } else {
                format!("Based on the tool result: {content}")
            }),
        })
        .collect();

    OllamaMessage {
        role: role.to_string(),
        content: parts.join("\n\n"),
    }
}

pub(super) fn normalize_response(resp: OllamaResponse) -> Result<LlmResponse, LlmError> {
    let text = resp.message.content;
    if text.trim().is_empty() {
        return Err(LlmError::unknown("Empty response from Ollama"));
    }

    Ok(LlmResponse {
        content: vec![ContentBlock::Text { text }],
        end_turn: resp.done,
        usage: Usage {
            input_tokens: resp.prompt_eval_count.unwrap_or(0),
            output_tokens: resp.eval_count.unwrap_or(0),
        },
    })
}

#[async_trait]
impl LlmService for OllamaService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let ollama_request = translate_request(&self.api_name, request);

        let response = self
            .client
            .post(&self.base_url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status, &body));
        }

        let ollama_response: OllamaResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        normalize_response(ollama_response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn tool_call_mode(&self) -> ToolCallMode {
        ToolCallMode::EmbeddedText
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
pub(super) struct OllamaRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
pub(super) struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(super) struct OllamaMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OllamaResponse {
    pub message: OllamaMessage,
    #[serde(default)]
    pub done: bool,
    pub prompt_eval_count: Option<u64>,
    pub eval_count: Option<u64>,
}
