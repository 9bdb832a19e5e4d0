//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::executor::{Session, SessionReport};
use super::traits::ModelClient;
use crate::llm::{
    ContentBlock, LlmError, LlmRequest, LlmResponse, ToolCallMode, ToolDescriptor, Usage,
};
use crate::state_machine::LoopContext;
use crate::tools::{
    CancelPolicy, DispatchOptions, ToolCatalog, ToolContext, ToolDispatcher, ToolError,
    ToolHandler,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    mode: ToolCallMode,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>, mode: ToolCallMode) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a plain text answer
    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse::from_text(text));
    }

    /// Queue a structured tool call
    pub fn queue_tool_call(&self, id: &str, name: &str, input: Value) {
        self.queue_response(LlmResponse {
            content: vec![ContentBlock::tool_use(id, name, input)],
            end_turn: false,
            usage: Usage::default(),
        });
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn tool_call_mode(&self) -> ToolCallMode {
        self.mode
    }
}

// ============================================================================
// Delayed Mock LLM Client (for cancellation testing)
// ============================================================================

/// Mock LLM client that never answers within a test's patience
pub struct DelayedMockLlmClient {
    delay: Duration,
    /// Notified when a request starts
    pub request_started: Arc<Notify>,
}

impl DelayedMockLlmClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ModelClient for DelayedMockLlmClient {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        Ok(LlmResponse::from_text("too late"))
    }

    fn model_id(&self) -> &'static str {
        "delayed-mock"
    }

    fn tool_call_mode(&self) -> ToolCallMode {
        ToolCallMode::Structured
    }
}

// ============================================================================
// Mock tools
// ============================================================================

/// The `search` tool used throughout the tests: one required string `query`
pub fn search_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "search".to_string(),
        description: "Search the web".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look for"}
            },
            "required": ["query"]
        }),
    }
}

/// Handler returning a fixed result and counting invocations
pub struct StaticHandler {
    result: Result<Value, ToolError>,
    calls: AtomicUsize,
}

impl StaticHandler {
    pub fn ok(value: Value) -> Self {
        Self {
            result: Ok(value),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn err(error: ToolError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolHandler for StaticHandler {
    async fn invoke(&self, _arguments: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Handler that sleeps without watching its cancel token
pub struct SlowHandler {
    delay: Duration,
    finished: AtomicBool,
    /// Notified when the handler starts running
    pub started: Arc<Notify>,
}

impl SlowHandler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: AtomicBool::new(false),
            started: Arc::new(Notify::new()),
        }
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolHandler for SlowHandler {
    async fn invoke(&self, _arguments: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(json!("slow result"))
    }
}

pub struct PanickingHandler;

#[async_trait]
impl ToolHandler for PanickingHandler {
    async fn invoke(&self, _arguments: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        panic!("tool exploded");
    }
}

// ============================================================================
// Session harness
// ============================================================================

/// Builder wiring a mock model and mock tools into a `Session`
pub struct SessionHarness {
    mock: Arc<MockLlmClient>,
    model: Option<Arc<dyn ModelClient>>,
    catalog: ToolCatalog,
    context: LoopContext,
    options: DispatchOptions,
    cancel: CancellationToken,
}

impl SessionHarness {
    pub fn new(mode: ToolCallMode) -> Self {
        let mut context = LoopContext::new("test-session", "mock-model");
        context.retry_base_delay = Duration::from_millis(1);
        Self {
            mock: Arc::new(MockLlmClient::new("mock-model", mode)),
            model: None,
            catalog: ToolCatalog::new(),
            context,
            options: DispatchOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn structured() -> Self {
        Self::new(ToolCallMode::Structured)
    }

    pub fn embedded() -> Self {
        Self::new(ToolCallMode::EmbeddedText)
    }

    /// The queued-response model used unless `with_model` replaced it
    pub fn llm(&self) -> Arc<MockLlmClient> {
        self.mock.clone()
    }

    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_tool(mut self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) -> Self {
        self.catalog.register(descriptor, handler).unwrap();
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.context.max_iterations = max_iterations;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.context.max_retries = max_retries;
        self
    }

    pub fn cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.options.cancel_policy = policy;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn build(self) -> Session<Arc<dyn ModelClient>, ToolDispatcher> {
        let model: Arc<dyn ModelClient> = self.model.unwrap_or(self.mock);
        let tools = ToolDispatcher::new(Arc::new(self.catalog), self.options);
        Session::new(self.context, model, tools, self.cancel)
    }

    pub async fn run(self, input: &str) -> SessionReport {
        self.build().run(input).await
    }
}
