//! Runtime for executing sessions
//!
//! Each query gets a fresh `Session` with its own conversation. The model
//! registry and tool catalog are built once at startup and shared
//! read-only between sessions.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{Session, SessionReport};
pub use traits::*;

use crate::config::LoopConfig;
use crate::llm::ModelRegistry;
use crate::tools::{ToolCatalog, ToolDispatcher};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Production session wiring
pub type ProductionSession = Session<RegistryLlmClient, ToolDispatcher>;

/// Why a session could not be started
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown model `{0}`")]
    UnknownModel(String),
    #[error("no models configured")]
    NoModels,
}

/// Starts sessions against the shared registry and catalog
pub struct RuntimeManager {
    llm_registry: Arc<ModelRegistry>,
    catalog: Arc<ToolCatalog>,
    loop_config: LoopConfig,
}

impl RuntimeManager {
    pub fn new(
        llm_registry: Arc<ModelRegistry>,
        catalog: Arc<ToolCatalog>,
        loop_config: LoopConfig,
    ) -> Self {
        Self {
            llm_registry,
            catalog,
            loop_config,
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Build a session for `model`, or the default model when none is given
    pub fn create_session(
        &self,
        model: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<ProductionSession, RuntimeError> {
        let client = RegistryLlmClient::resolve(&self.llm_registry, model).ok_or_else(|| {
            match model {
                Some(id) => RuntimeError::UnknownModel(id.to_string()),
                None => RuntimeError::NoModels,
            }
        })?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let context = self.loop_config.context(&session_id, client.model_id());
        let tools = ToolDispatcher::new(self.catalog.clone(), self.loop_config.dispatch_options());

        let session = Session::new(context, client, tools, cancel);
        Ok(match self.loop_config.max_tokens {
            Some(max_tokens) => session.with_max_tokens(max_tokens),
            None => session,
        })
    }

    /// Run one query to completion in a fresh session
    pub async fn run_query(
        &self,
        query: &str,
        model: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<SessionReport, RuntimeError> {
        let session = self.create_session(model, cancel)?;
        Ok(session.run(query).await)
    }
}
