//! HTTP API
//!
//! A thin I/O surface over the runtime: every `POST /query` runs one
//! isolated session to completion.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::llm::ModelRegistry;
use crate::runtime::RuntimeManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(runtime: Arc<RuntimeManager>, llm_registry: Arc<ModelRegistry>) -> Self {
        Self {
            runtime,
            llm_registry,
        }
    }
}
