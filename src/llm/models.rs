//! Centralized model definitions for all LLM providers
//!
//! This module contains all model definitions in a single location,
//! making it easier to add new models and providers.

use super::anthropic::AnthropicModel;
use super::{AnthropicService, LlmService, OllamaService};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    Ollama,
}

impl Provider {
    /// Get the display name for this provider
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::Ollama => "Ollama",
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "claude-3.5-haiku")
    pub id: &'static str,
    /// Provider for this model
    pub provider: Provider,
    /// Human-readable description
    pub description: &'static str,
    /// Factory taking the provider credential (API key or host URL)
    pub factory: fn(&str) -> Result<Arc<dyn LlmService>, String>,
}

fn anthropic(api_key: &str, model: AnthropicModel) -> Result<Arc<dyn LlmService>, String> {
    if api_key.is_empty() {
        return Err(format!("{} requires ANTHROPIC_API_KEY", model.model_id()));
    }
    AnthropicService::new(api_key.to_string(), model)
        .map(|s| Arc::new(s) as Arc<dyn LlmService>)
        .map_err(|e| e.to_string())
}

fn ollama(host: &str, api_name: &str, model_id: &str) -> Result<Arc<dyn LlmService>, String> {
    if host.is_empty() {
        return Err(format!("{model_id} requires OLLAMA_HOST"));
    }
    OllamaService::new(host, api_name, model_id)
        .map(|s| Arc::new(s) as Arc<dyn LlmService>)
        .map_err(|e| e.to_string())
}

static MODELS: &[ModelDef] = &[
    // Anthropic models (structured tool calls)
    ModelDef {
        id: "claude-3.5-haiku",
        provider: Provider::Anthropic,
        description: "Claude 3.5 Haiku (fast, structured tool calls)",
        factory: |key| anthropic(key, AnthropicModel::Claude35Haiku),
    },
    ModelDef {
        id: "claude-4.5-haiku",
        provider: Provider::Anthropic,
        description: "Claude Haiku 4.5 (fast, efficient)",
        factory: |key| anthropic(key, AnthropicModel::Claude45Haiku),
    },
    ModelDef {
        id: "claude-4.5-sonnet",
        provider: Provider::Anthropic,
        description: "Claude Sonnet 4.5 (balanced performance)",
        factory: |key| anthropic(key, AnthropicModel::Claude45Sonnet),
    },
    // Local models served by Ollama (tool calls embedded in text)
    ModelDef {
        id: "gemma3",
        provider: Provider::Ollama,
        description: "Gemma 3 via Ollama (JSON tool calls in text)",
        factory: |host| ollama(host, "gemma3", "gemma3"),
    },
    ModelDef {
        id: "gemma-7b",
        provider: Provider::Ollama,
        description: "Gemma 7B via Ollama (JSON tool calls in text)",
        factory: |host| ollama(host, "gemma:7b", "gemma-7b"),
    },
];

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    MODELS
}
