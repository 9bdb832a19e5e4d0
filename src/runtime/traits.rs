//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, ModelRegistry, ToolCallMode};
use crate::tools::{ToolCall, ToolCatalog, ToolContext, ToolDispatcher, ToolResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for making model requests
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Complete a model request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;

    /// How tool calls come back from this model
    fn tool_call_mode(&self) -> ToolCallMode;
}

/// Executor for tool calls
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one call; never fails, failures are folded into the result
    async fn dispatch(&self, call: &ToolCall, ctx: ToolContext) -> ToolResult;

    /// Catalog the calls are resolved against
    fn catalog(&self) -> &ToolCatalog;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn tool_call_mode(&self) -> ToolCallMode {
        (**self).tool_call_mode()
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn dispatch(&self, call: &ToolCall, ctx: ToolContext) -> ToolResult {
        (**self).dispatch(call, ctx).await
    }

    fn catalog(&self) -> &ToolCatalog {
        (**self).catalog()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use a registry model as `ModelClient`
pub struct RegistryLlmClient {
    service: Arc<dyn LlmService>,
}

impl RegistryLlmClient {
    /// Look up `model_id`, or the registry default when none is given
    pub fn resolve(registry: &ModelRegistry, model_id: Option<&str>) -> Option<Self> {
        let service = match model_id {
            Some(id) => registry.get(id),
            None => registry.default(),
        }?;
        Some(Self { service })
    }
}

#[async_trait]
impl ModelClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }

    fn tool_call_mode(&self) -> ToolCallMode {
        self.service.tool_call_mode()
    }
}

#[async_trait]
impl ToolExecutor for ToolDispatcher {
    async fn dispatch(&self, call: &ToolCall, ctx: ToolContext) -> ToolResult {
        ToolDispatcher::dispatch(self, call, ctx).await
    }

    fn catalog(&self) -> &ToolCatalog {
        ToolDispatcher::catalog(self)
    }
}
