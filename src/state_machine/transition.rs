//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! new state and effects. All I/O happens in the executor.

use super::state::{FailureCategory, LoopContext, LoopFailure, LoopState};
use super::{Effect, Event};
use crate::conversation::Message;
use crate::llm::{ContentBlock, LlmError, LlmResponse};
use crate::tools::{ParseOutcome, ToolCall, ToolResult};
use std::time::Duration;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: LoopState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: LoopState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn failed(category: FailureCategory, message: impl Into<String>) -> Self {
        Self::new(LoopState::Failed {
            failure: LoopFailure::new(category, message),
        })
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("session already finished ({0})")]
    Terminal(&'static str),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

/// Backoff before retry number `failed_attempt`: base, 2×base, 4×base, ...
pub fn retry_delay(base: Duration, failed_attempt: u32) -> Duration {
    let exponent = failed_attempt.saturating_sub(1).min(16);
    base.saturating_mul(1 << exponent)
}

/// Pure transition function
pub fn transition(
    state: &LoopState,
    context: &LoopContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if state.is_terminal() {
        return Err(TransitionError::Terminal(state.name()));
    }

    match (state, event) {
        // ============================================================
        // Events accepted from any working state
        // ============================================================
        // Calls that never ran still get an answer so none is left dangling
        (
            LoopState::DispatchingTool {
                current, remaining, ..
            },
            Event::Cancelled,
        ) => Ok(std::iter::once(current).chain(remaining).fold(
            TransitionResult::failed(FailureCategory::Cancelled, "session cancelled"),
            |result, call| {
                result.with_effect(Effect::append_tool_result(&ToolResult::failure(
                    &call.id,
                    call.invocation.clone(),
                    "cancelled before the tool ran",
                )))
            },
        )),

        (_, Event::Cancelled) => Ok(TransitionResult::failed(
            FailureCategory::Cancelled,
            "session cancelled",
        )),

        (_, Event::ProtocolViolation { message }) => {
            Ok(TransitionResult::failed(FailureCategory::Protocol, message))
        }

        // ============================================================
        // Model requests and retry
        // ============================================================
        (LoopState::AwaitingModel { round_trips, .. }, Event::ModelResponded { response }) => {
            Ok(TransitionResult::new(LoopState::InspectingResponse {
                response: response.clone(),
                round_trips: *round_trips,
            })
            .with_effect(Effect::InspectResponse { response }))
        }

        (
            LoopState::AwaitingModel {
                attempt,
                round_trips,
            },
            Event::ModelFailed {
                error,
                attempt: failed_attempt,
            },
        ) if *attempt == failed_attempt => Ok(handle_model_error(
            context,
            *attempt,
            *round_trips,
            &error,
        )),

        (
            LoopState::AwaitingModel { attempt, .. },
            Event::RetryElapsed {
                attempt: retry_attempt,
            },
        ) if *attempt == retry_attempt => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::RequestModel))
        }

        // ============================================================
        // Response inspection
        // ============================================================
        (
            LoopState::InspectingResponse {
                response,
                round_trips,
            },
            Event::Inspected { outcome },
        ) => Ok(handle_inspection(context, response, *round_trips, outcome)),

        // ============================================================
        // Tool execution
        // ============================================================
        (
            LoopState::DispatchingTool {
                current,
                remaining,
                round_trips,
            },
            Event::ToolCompleted { result },
        ) if result.tool_use_id == current.id => {
            let append = Effect::append_tool_result(&result);

            if let Some((next, rest)) = remaining.split_first() {
                Ok(TransitionResult::new(LoopState::DispatchingTool {
                    current: next.clone(),
                    remaining: rest.to_vec(),
                    round_trips: *round_trips,
                })
                .with_effect(append)
                .with_effect(Effect::dispatch(next.clone())))
            } else {
                Ok(TransitionResult::new(LoopState::AwaitingModel {
                    attempt: 1,
                    round_trips: *round_trips,
                })
                .with_effect(append)
                .with_effect(Effect::RequestModel))
            }
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {}",
            state.name(),
            event_name(&event)
        ))),
    }
}

fn handle_model_error(
    context: &LoopContext,
    attempt: u32,
    round_trips: u32,
    error: &LlmError,
) -> TransitionResult {
    if !error.kind.is_retryable() {
        return TransitionResult::failed(FailureCategory::ProviderRejected, error.message.clone());
    }

    if attempt > context.max_retries {
        return TransitionResult::failed(
            FailureCategory::ProviderUnavailable,
            format!(
                "provider unavailable after {attempt} attempts: {}",
                error.message
            ),
        );
    }

    let delay = error
        .retry_after
        .unwrap_or_else(|| retry_delay(context.retry_base_delay, attempt));
    let next_attempt = attempt + 1;

    TransitionResult::new(LoopState::AwaitingModel {
        attempt: next_attempt,
        round_trips,
    })
    .with_effect(Effect::ScheduleRetry {
        delay,
        attempt: next_attempt,
    })
}

fn handle_inspection(
    context: &LoopContext,
    response: &LlmResponse,
    round_trips: u32,
    outcome: ParseOutcome,
) -> TransitionResult {
    let calls = match outcome {
        ParseOutcome::NoInvocation => {
            return finish(response, None);
        }
        ParseOutcome::Malformed { reason } => {
            return finish(response, Some(reason));
        }
        ParseOutcome::Invocations(calls) if calls.is_empty() => {
            return finish(response, None);
        }
        ParseOutcome::Invocations(calls) => calls,
    };

    if round_trips >= context.max_iterations {
        return TransitionResult::failed(
            FailureCategory::IterationLimit,
            format!(
                "exceeded maximum tool iterations ({})",
                context.max_iterations
            ),
        );
    }

    let message = Message::assistant(tool_call_content(response, &calls));
    let mut calls = calls.into_iter();
    let Some(current) = calls.next() else {
        return finish(response, None);
    };

    TransitionResult::new(LoopState::DispatchingTool {
        current: current.clone(),
        remaining: calls.collect(),
        round_trips: round_trips + 1,
    })
    .with_effect(Effect::append(message))
    .with_effect(Effect::dispatch(current))
}

fn finish(response: &LlmResponse, malformed_tool_call: Option<String>) -> TransitionResult {
    TransitionResult::new(LoopState::Done {
        answer: response.text(),
        malformed_tool_call,
    })
    .with_effect(Effect::append(Message::assistant(response.content.clone())))
}

/// Assistant content that carries every call's correlation id
///
/// Structured responses already hold a `tool_use` block per call; calls
/// parsed out of text get one added next to the text they came from.
fn tool_call_content(response: &LlmResponse, calls: &[ToolCall]) -> Vec<ContentBlock> {
    let mut content = response.content.clone();
    let present: Vec<String> = response
        .tool_uses()
        .into_iter()
        .map(|(id, _, _)| id.to_string())
        .collect();

    for call in calls {
        if !present.contains(&call.id) {
            content.push(ContentBlock::tool_use(
                call.id.clone(),
                call.invocation.name.clone(),
                call.invocation.arguments.clone(),
            ));
        }
    }
    content
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::ModelResponded { .. } => "ModelResponded",
        Event::ModelFailed { .. } => "ModelFailed",
        Event::RetryElapsed { .. } => "RetryElapsed",
        Event::Inspected { .. } => "Inspected",
        Event::ToolCompleted { .. } => "ToolCompleted",
        Event::ProtocolViolation { .. } => "ProtocolViolation",
        Event::Cancelled => "Cancelled",
    }
}
