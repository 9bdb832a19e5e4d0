//! Tool dispatch: resolve, validate, run, normalize
//!
//! Nothing that goes wrong inside a tool ends the session. Unknown names,
//! bad arguments, tool errors, panics and timeouts all come back as a
//! failed `ToolResult` the model can read and react to.

use super::{ToolCall, ToolCatalog, ToolContext, ToolResult};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default per-call timeout, sized for the slowest external lookup
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with an in-flight tool when the session is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Abort the tool task and record a cancelled failure
    #[default]
    Abandon,
    /// Let the tool finish and record its real result
    Complete,
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abandon" => Ok(Self::Abandon),
            "complete" => Ok(Self::Complete),
            other => Err(format!(
                "unknown cancel policy `{other}` (expected `abandon` or `complete`)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub timeout: Duration,
    pub cancel_policy: CancelPolicy,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TOOL_TIMEOUT,
            cancel_policy: CancelPolicy::default(),
        }
    }
}

pub struct ToolDispatcher {
    catalog: Arc<ToolCatalog>,
    options: DispatchOptions,
}

impl ToolDispatcher {
    pub fn new(catalog: Arc<ToolCatalog>, options: DispatchOptions) -> Self {
        Self { catalog, options }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Run one call to completion and normalize whatever happened
    pub async fn dispatch(&self, call: &ToolCall, ctx: ToolContext) -> ToolResult {
        let invocation = call.invocation.clone();
        let fail = |message: String| {
            tracing::warn!(
                session_id = %ctx.session_id,
                tool = %call.name(),
                tool_use_id = %call.id,
                error = %message,
                "Tool call failed"
            );
            ToolResult::failure(&call.id, invocation.clone(), message)
        };

        if let Some(rejection) = &call.rejection {
            return fail(rejection.to_string());
        }

        let handler = match self.catalog.resolve(call.name()) {
            Ok(handler) => handler,
            Err(e) => {
                let available = self.catalog.names().join(", ");
                return fail(format!("{e}; available tools: {available}"));
            }
        };

        if let Err(e) = self.catalog.validate(call.name(), &call.invocation.arguments) {
            return fail(e.to_string());
        }

        tracing::info!(
            session_id = %ctx.session_id,
            tool = %call.name(),
            tool_use_id = %call.id,
            "Executing tool"
        );
        let start = Instant::now();

        // Run in its own task so a panicking tool surfaces as a JoinError
        let cancel = ctx.cancel.clone();
        let arguments = call.invocation.arguments.clone();
        let task_ctx = ctx.clone();
        let mut task = tokio::spawn(async move { handler.invoke(arguments, task_ctx).await });
        let abort = task.abort_handle();
        let abandon_on_cancel = self.options.cancel_policy == CancelPolicy::Abandon;

        let joined = tokio::select! {
            biased;

            () = cancel.cancelled(), if abandon_on_cancel => {
                abort.abort();
                return fail("cancelled before the tool finished".to_string());
            }

            joined = tokio::time::timeout(self.options.timeout, &mut task) => joined,
        };

        let result = match joined {
            Err(_elapsed) => {
                abort.abort();
                return fail(format!(
                    "timed out after {}s",
                    self.options.timeout.as_secs_f64()
                ));
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                return fail("tool panicked".to_string());
            }
            Ok(Err(join_error)) => return fail(format!("tool task failed: {join_error}")),
            Ok(Ok(Err(tool_error))) => return fail(tool_error.to_string()),
            Ok(Ok(Ok(value))) => ToolResult::success(&call.id, invocation.clone(), value),
        };

        tracing::info!(
            session_id = %ctx.session_id,
            tool = %call.name(),
            tool_use_id = %call.id,
            duration_ms = %start.elapsed().as_millis(),
            "Tool completed"
        );
        result
    }
}
