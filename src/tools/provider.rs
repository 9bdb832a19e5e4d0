//! Tool providers: where tool descriptors and implementations come from

use super::{EmailAgeTool, ThinkTool, Tool, ToolContext, ToolError, ToolHandler};
use crate::llm::ToolDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Source of tools, independent of transport
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Advertised tools, called once when the catalog is built
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    async fn invoke(&self, name: &str, arguments: Value, ctx: ToolContext)
        -> Result<Value, ToolError>;
}

/// Serves `Tool` implementations from this process
pub struct LocalToolProvider {
    tools: Vec<Arc<dyn Tool>>,
}

impl LocalToolProvider {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// The tools shipped with the binary
    pub fn builtin() -> Self {
        Self::new(vec![Arc::new(ThinkTool), Arc::new(EmailAgeTool)])
    }
}

#[async_trait]
impl ToolProvider for LocalToolProvider {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(self
            .tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect())
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::Unavailable(format!("no local tool named `{name}`")))?;
        tool.run(arguments, ctx).await
    }
}

/// Catalog handler that forwards to a provider by name
pub struct ProviderHandler {
    provider: Arc<dyn ToolProvider>,
    name: String,
}

impl ProviderHandler {
    pub fn new(provider: Arc<dyn ToolProvider>, name: &str) -> Self {
        Self {
            provider,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ToolHandler for ProviderHandler {
    async fn invoke(&self, arguments: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        self.provider.invoke(&self.name, arguments, ctx).await
    }
}
