//! Registry of callable tools and their input schemas

use super::{ProviderHandler, ToolContext, ToolError, ToolProvider};
use crate::llm::ToolDescriptor;
use async_trait::async_trait;
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{ValidationError, Validator};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Something that can execute a named tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: Value, ctx: ToolContext) -> Result<Value, ToolError>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("tool `{name}` has an invalid input schema: {reason}")]
    InvalidSchema { name: String, reason: String },
    #[error("tool provider failed: {0}")]
    Provider(#[from] ToolError),
}

/// Arguments that don't fit a tool's declared schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid arguments for `{tool}`: {message}")]
pub struct SchemaValidationError {
    pub tool: String,
    /// First offending top-level field, when one can be named
    pub field: Option<String>,
    pub message: String,
}

struct CatalogEntry {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
    validator: Validator,
}

/// Tool name → implementation + schema
///
/// Filled during startup, then shared read-only (usually behind an `Arc`)
/// by every session.
#[derive(Default)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a catalog from everything a provider advertises
    pub async fn load(provider: Arc<dyn ToolProvider>) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for descriptor in provider.list_tools().await? {
            let handler = Arc::new(ProviderHandler::new(provider.clone(), &descriptor.name));
            catalog.register(descriptor, handler)?;
        }
        tracing::info!(tools = ?catalog.names(), "Tool catalog loaded");
        Ok(catalog)
    }

    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), CatalogError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(CatalogError::DuplicateTool(descriptor.name));
        }

        let validator =
            Validator::new(&descriptor.input_schema).map_err(|e| CatalogError::InvalidSchema {
                name: descriptor.name.clone(),
                reason: e.to_string(),
            })?;

        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(CatalogEntry {
            descriptor,
            handler,
            validator,
        });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ToolHandler>, CatalogError> {
        self.entry(name)
            .map(|entry| entry.handler.clone())
            .ok_or_else(|| CatalogError::UnknownTool(name.to_string()))
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.entry(name).map(|entry| &entry.descriptor)
    }

    /// Descriptors in registration order
    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check arguments against the tool's declared schema
    ///
    /// Reports the validator's first error, naming the top-level field it
    /// concerns when there is one.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<(), SchemaValidationError> {
        let Some(entry) = self.entry(name) else {
            return Err(SchemaValidationError {
                tool: name.to_string(),
                field: None,
                message: format!("unknown tool `{name}`"),
            });
        };

        let Some(error) = entry.validator.iter_errors(arguments).next() else {
            return Ok(());
        };
        let (field, message) = describe_error(&error);
        Err(SchemaValidationError {
            tool: name.to_string(),
            field,
            message,
        })
    }

    fn entry(&self, name: &str) -> Option<&CatalogEntry> {
        self.index.get(name).and_then(|&i| self.entries.get(i))
    }
}

/// Field and message for a validator error
///
/// A top-level `required` error sits on the arguments object itself, so the
/// field comes from the keyword. Everything else is located by its instance
/// path.
fn describe_error(error: &ValidationError<'_>) -> (Option<String>, String) {
    let field = top_level_field(error.instance_path.as_str());
    if let (ValidationErrorKind::Required { property }, None) = (&error.kind, &field) {
        let field = property
            .as_str()
            .map_or_else(|| property.to_string(), str::to_string);
        let message = format!("missing required parameter `{field}`");
        return (Some(field), message);
    }

    let message = match (&error.kind, &field) {
        (
            ValidationErrorKind::Type {
                kind: TypeKind::Single(expected),
            },
            Some(field),
        ) if error.instance_path.as_str().matches('/').count() == 1 => format!(
            "parameter `{field}` must be of type {expected}, got {}",
            json_type_name(&error.instance)
        ),
        _ => error.to_string(),
    };
    (field, message)
}

/// First segment of a JSON pointer such as `/filters/limit`
fn top_level_field(pointer: &str) -> Option<String> {
    pointer
        .split('/')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
