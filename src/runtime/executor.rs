//! Session executor
//!
//! Owns one conversation and drives the pure state machine: every effect it
//! is handed is executed here, and whatever event that I/O produces is fed
//! back through `transition` until the session reaches `Done` or `Failed`.

use super::traits::{ModelClient, ToolExecutor};
use crate::conversation::{ConversationState, Message};
use crate::llm::{LlmRequest, SystemContent, ToolCallMode};
use crate::state_machine::{
    transition, Effect, Event, FailureCategory, LoopContext, LoopFailure, LoopState,
};
use crate::system_prompt::build_system_prompt;
use crate::tools::{parse_response, ParseOutcome, ToolCall, ToolContext};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Final answer of a successful session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub answer: String,
    /// Set when the answer looked like a tool call but could not be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malformed_tool_call: Option<String>,
}

/// Everything a caller gets back from a finished session
#[derive(Debug)]
pub struct SessionReport {
    pub session_id: String,
    pub outcome: Result<Completion, LoopFailure>,
    pub conversation: ConversationState,
    pub model_requests: usize,
    pub tool_dispatches: usize,
}

/// One run of the orchestration loop over a fresh conversation
pub struct Session<M, T>
where
    M: ModelClient,
    T: ToolExecutor,
{
    context: LoopContext,
    state: LoopState,
    conversation: ConversationState,
    model: M,
    tools: T,
    cancel: CancellationToken,
    max_tokens: Option<u32>,
    model_requests: usize,
    tool_dispatches: usize,
}

impl<M, T> Session<M, T>
where
    M: ModelClient,
    T: ToolExecutor,
{
    pub fn new(context: LoopContext, model: M, tools: T, cancel: CancellationToken) -> Self {
        let prompt = build_system_prompt(model.tool_call_mode(), &tools.catalog().describe_all());
        Self {
            context,
            state: LoopState::AwaitingModel {
                attempt: 1,
                round_trips: 0,
            },
            conversation: ConversationState::with_system(prompt),
            model,
            tools,
            cancel,
            max_tokens: None,
            model_requests: 0,
            tool_dispatches: 0,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Run the loop to a terminal state. Consumes the session; a new
    /// question needs a new session.
    pub async fn run(mut self, user_input: impl Into<String>) -> SessionReport {
        let start = Instant::now();
        tracing::info!(
            session_id = %self.context.session_id,
            model = %self.context.model_id,
            tools = self.tools.catalog().len(),
            "Session started"
        );

        let mut queue = VecDeque::from([Effect::append(Message::user(user_input)), Effect::RequestModel]);

        while let Some(effect) = queue.pop_front() {
            let Some(event) = self.execute_effect(effect).await else {
                continue;
            };

            // Nothing queued behind a broken append may run
            if matches!(event, Event::ProtocolViolation { .. }) {
                queue.clear();
            }

            match transition(&self.state, &self.context, event) {
                Ok(result) => {
                    tracing::debug!(
                        session_id = %self.context.session_id,
                        from = self.state.name(),
                        to = result.new_state.name(),
                        round_trips = ?result.new_state.round_trips(),
                        effects = result.effects.len(),
                        "State transition"
                    );
                    self.state = result.new_state;
                    queue.extend(result.effects);
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %self.context.session_id,
                        state = self.state.name(),
                        error = %e,
                        "Rejected event"
                    );
                    self.state = LoopState::Failed {
                        failure: LoopFailure::new(FailureCategory::Protocol, e.to_string()),
                    };
                    queue.clear();
                }
            }
        }

        let outcome = match self.state {
            LoopState::Done {
                answer,
                malformed_tool_call,
            } => Ok(Completion {
                answer,
                malformed_tool_call,
            }),
            LoopState::Failed { failure } => Err(failure),
            stalled => Err(LoopFailure::new(
                FailureCategory::Protocol,
                format!("session stalled in {}", stalled.name()),
            )),
        };

        match &outcome {
            Ok(_) => tracing::info!(
                session_id = %self.context.session_id,
                duration_ms = %start.elapsed().as_millis(),
                model_requests = self.model_requests,
                tool_dispatches = self.tool_dispatches,
                "Session done"
            ),
            Err(failure) => tracing::warn!(
                session_id = %self.context.session_id,
                duration_ms = %start.elapsed().as_millis(),
                category = %failure.category,
                error = %failure.message,
                "Session failed"
            ),
        }

        SessionReport {
            session_id: self.context.session_id,
            outcome,
            conversation: self.conversation,
            model_requests: self.model_requests,
            tool_dispatches: self.tool_dispatches,
        }
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::AppendMessage { message } => match self.conversation.append(message) {
                Ok(()) => None,
                Err(e) => Some(Event::ProtocolViolation {
                    message: e.to_string(),
                }),
            },

            Effect::RequestModel => Some(self.request_model().await),

            Effect::ScheduleRetry { delay, attempt } => {
                tracing::info!(
                    session_id = %self.context.session_id,
                    attempt,
                    delay_ms = %delay.as_millis(),
                    "Retrying model request"
                );
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => Some(Event::Cancelled),
                    () = tokio::time::sleep(delay) => Some(Event::RetryElapsed { attempt }),
                }
            }

            Effect::InspectResponse { response } => {
                let outcome =
                    parse_response(self.model.tool_call_mode(), &response, self.tools.catalog());
                if let ParseOutcome::Malformed { reason } = &outcome {
                    tracing::warn!(
                        session_id = %self.context.session_id,
                        reason = %reason,
                        "Response looked like a tool call but could not be decoded; treating it as the answer"
                    );
                }
                Some(Event::Inspected { outcome })
            }

            Effect::DispatchTool { call } => Some(self.dispatch_tool(&call).await),
        }
    }

    async fn request_model(&mut self) -> Event {
        if self.cancel.is_cancelled() {
            return Event::Cancelled;
        }
        let LoopState::AwaitingModel { attempt, .. } = self.state else {
            return Event::ProtocolViolation {
                message: format!("model requested while {}", self.state.name()),
            };
        };

        let tools = match self.model.tool_call_mode() {
            ToolCallMode::Structured => self.tools.catalog().describe_all(),
            ToolCallMode::EmbeddedText => vec![],
        };
        let request = LlmRequest {
            system: self
                .conversation
                .system()
                .map(|s| vec![SystemContent::cached(s)])
                .unwrap_or_default(),
            messages: self.conversation.to_llm_messages(),
            tools,
            max_tokens: self.max_tokens,
        };

        self.model_requests += 1;
        tracing::debug!(
            session_id = %self.context.session_id,
            attempt,
            messages = request.messages.len(),
            "Requesting model"
        );

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Event::Cancelled,
            result = self.model.complete(&request) => match result {
                Ok(response) => Event::ModelResponded { response },
                Err(error) => Event::ModelFailed { error, attempt },
            },
        }
    }

    async fn dispatch_tool(&mut self, call: &ToolCall) -> Event {
        if self.cancel.is_cancelled() {
            return Event::Cancelled;
        }
        self.tool_dispatches += 1;
        let ctx = ToolContext::new(
            self.cancel.child_token(),
            self.context.session_id.clone(),
            call.id.clone(),
        );
        let result = self.tools.dispatch(call, ctx).await;
        tracing::info!(
            session_id = %self.context.session_id,
            tool = %call.name(),
            tool_use_id = %call.id,
            success = result.is_success(),
            "Tool call finished"
        );
        Event::ToolCompleted { result }
    }
}
