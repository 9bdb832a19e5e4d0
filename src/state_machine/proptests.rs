//! Property-based tests for the state machine
//!
//! A scripted driver plays the executor's role (answering effects with the
//! events real I/O would produce) so whole sessions can be generated.

use super::state::*;
use super::transition::*;
use super::{Effect, Event};
use crate::llm::{ContentBlock, LlmError, LlmErrorKind, LlmResponse, Usage};
use crate::tools::{ParseOutcome, ToolCall, ToolInvocation, ToolResult};
use proptest::prelude::*;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;

// ============================================================================
// Generators
// ============================================================================

/// What the model does on one request
#[derive(Debug, Clone)]
enum Turn {
    Answer(String),
    Calls(usize),
    Malformed,
    Fail(LlmErrorKind),
}

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    prop_oneof![
        2 => "[a-zA-Z ]{1,30}".prop_map(Turn::Answer),
        4 => (1usize..4).prop_map(Turn::Calls),
        1 => Just(Turn::Malformed),
        2 => arb_error_kind().prop_map(Turn::Fail),
    ]
}

fn arb_context() -> impl Strategy<Value = LoopContext> {
    (0u32..6, 0u32..4).prop_map(|(max_iterations, max_retries)| LoopContext {
        max_iterations,
        max_retries,
        retry_base_delay: Duration::from_millis(10),
        ..LoopContext::new("prop-session", "prop-model")
    })
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Cancelled),
        "[a-z ]{1,20}".prop_map(|message| Event::ProtocolViolation { message }),
        (1u32..5).prop_map(|attempt| Event::RetryElapsed { attempt }),
        Just(Event::ModelResponded {
            response: LlmResponse::from_text("hi"),
        }),
        Just(Event::Inspected {
            outcome: ParseOutcome::NoInvocation,
        }),
    ]
}

fn arb_terminal_state() -> impl Strategy<Value = LoopState> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map(|answer| LoopState::Done {
            answer,
            malformed_tool_call: None,
        }),
        Just(LoopState::Failed {
            failure: LoopFailure::new(FailureCategory::Protocol, "x"),
        }),
    ]
}

// ============================================================================
// Scripted driver
// ============================================================================

struct Trace {
    states: Vec<LoopState>,
    effects: Vec<Effect>,
    model_requests: usize,
}

fn tool_response(turn_index: usize, count: usize) -> (LlmResponse, Vec<ToolCall>) {
    let calls: Vec<ToolCall> = (0..count)
        .map(|i| {
            ToolCall::new(
                format!("t{turn_index}_{i}"),
                ToolInvocation::new("search", json!({"query": "q"})),
            )
        })
        .collect();
    let content = calls
        .iter()
        .map(|c| ContentBlock::tool_use(c.id.clone(), "search", c.invocation.arguments.clone()))
        .collect();
    let response = LlmResponse {
        content,
        end_turn: false,
        usage: Usage::default(),
    };
    (response, calls)
}

/// Run a session against scripted model turns; stops at a terminal state
/// or when the script runs out
fn drive(ctx: &LoopContext, turns: &[Turn]) -> Trace {
    let mut state = LoopState::AwaitingModel {
        attempt: 1,
        round_trips: 0,
    };
    let mut trace = Trace {
        states: vec![state.clone()],
        effects: vec![],
        model_requests: 0,
    };
    let mut script = turns.iter().enumerate();
    let mut pending_calls: Vec<ToolCall> = vec![];
    let mut queue: VecDeque<Effect> = VecDeque::from([Effect::RequestModel]);

    while let Some(effect) = queue.pop_front() {
        let event = match &effect {
            Effect::RequestModel => {
                let Some((i, turn)) = script.next() else { break };
                trace.model_requests += 1;
                let attempt = match &state {
                    LoopState::AwaitingModel { attempt, .. } => *attempt,
                    _ => 1,
                };
                match turn {
                    Turn::Answer(text) => Some(Event::ModelResponded {
                        response: LlmResponse::from_text(text.clone()),
                    }),
                    Turn::Malformed => Some(Event::ModelResponded {
                        response: LlmResponse::from_text("{not json"),
                    }),
                    Turn::Calls(n) => {
                        let (response, calls) = tool_response(i, *n);
                        pending_calls = calls;
                        Some(Event::ModelResponded { response })
                    }
                    Turn::Fail(kind) => Some(Event::ModelFailed {
                        error: LlmError::new(*kind, "scripted failure"),
                        attempt,
                    }),
                }
            }
            Effect::ScheduleRetry { attempt, .. } => Some(Event::RetryElapsed { attempt: *attempt }),
            Effect::InspectResponse { response } => {
                let outcome = if response.tool_uses().is_empty() {
                    if response.text().starts_with('{') {
                        ParseOutcome::Malformed {
                            reason: "scripted".to_string(),
                        }
                    } else {
                        ParseOutcome::NoInvocation
                    }
                } else {
                    ParseOutcome::Invocations(std::mem::take(&mut pending_calls))
                };
                Some(Event::Inspected { outcome })
            }
            Effect::DispatchTool { call } => Some(Event::ToolCompleted {
                result: ToolResult::success(&call.id, call.invocation.clone(), json!("ok")),
            }),
            Effect::AppendMessage { .. } => None,
        };
        trace.effects.push(effect);

        if let Some(event) = event {
            let result = transition(&state, ctx, event).expect("driver only sends valid events");
            state = result.new_state;
            trace.states.push(state.clone());
            queue.extend(result.effects);
        }
    }

    trace
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Terminal states reject every event
    #[test]
    fn prop_terminal_states_are_final(state in arb_terminal_state(), event in arb_event()) {
        let result = transition(&state, &LoopContext::new("s", "m"), event);
        prop_assert!(matches!(result, Err(TransitionError::Terminal(_))));
    }

    /// Cancellation always ends a working session as Cancelled
    #[test]
    fn prop_cancel_always_fails_cancelled(attempt in 1u32..4, round_trips in 0u32..5) {
        let state = LoopState::AwaitingModel { attempt, round_trips };
        let result = transition(&state, &LoopContext::new("s", "m"), Event::Cancelled).unwrap();
        let is_cancelled = matches!(
            result.new_state,
            LoopState::Failed { failure: LoopFailure { category: FailureCategory::Cancelled, .. } }
        );
        prop_assert!(is_cancelled);
        prop_assert!(result.effects.is_empty());
    }

    /// Round trips never exceed the configured limit and attempts never
    /// exceed the retry budget
    #[test]
    fn prop_bounds_respected(
        ctx in arb_context(),
        turns in proptest::collection::vec(arb_turn(), 1..25),
    ) {
        let trace = drive(&ctx, &turns);
        for state in &trace.states {
            if let Some(round_trips) = state.round_trips() {
                prop_assert!(round_trips <= ctx.max_iterations);
            }
            if let LoopState::AwaitingModel { attempt, .. } = state {
                prop_assert!(*attempt <= ctx.max_retries + 1);
            }
        }
        let dispatched_batches = trace
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::AppendMessage { message } if message.requested_tool_ids().next().is_some()))
            .count();
        prop_assert!(dispatched_batches <= ctx.max_iterations as usize);
    }

    /// Every dispatched call was announced by an earlier assistant message
    /// and every dispatched call gets exactly one result appended
    #[test]
    fn prop_tool_calls_correlated(
        ctx in arb_context(),
        turns in proptest::collection::vec(arb_turn(), 1..25),
    ) {
        let trace = drive(&ctx, &turns);
        let mut announced: Vec<String> = vec![];
        let mut answered: Vec<String> = vec![];
        for effect in &trace.effects {
            match effect {
                Effect::AppendMessage { message } => {
                    announced.extend(message.requested_tool_ids().map(str::to_string));
                    if let Some(id) = &message.tool_use_id {
                        prop_assert!(announced.contains(id), "result {} before request", id);
                        prop_assert!(!answered.contains(id), "duplicate result {}", id);
                        answered.push(id.clone());
                    }
                }
                Effect::DispatchTool { call } => {
                    prop_assert!(announced.contains(&call.id), "dispatch {} before announce", call.id);
                }
                _ => {}
            }
        }
    }

    /// A non-transient provider error ends the session on the spot
    #[test]
    fn prop_non_transient_errors_never_retry(
        ctx in arb_context(),
        kind in prop_oneof![
            Just(LlmErrorKind::Auth),
            Just(LlmErrorKind::InvalidRequest),
            Just(LlmErrorKind::Unknown),
        ],
    ) {
        let trace = drive(&ctx, &[Turn::Fail(kind), Turn::Answer("unreachable".into())]);
        prop_assert_eq!(trace.model_requests, 1);
        let rejected = matches!(
            trace.states.last(),
            Some(LoopState::Failed { failure: LoopFailure { category: FailureCategory::ProviderRejected, .. } })
        );
        prop_assert!(rejected);
    }

    /// Transient failures are retried exactly `max_retries` times
    #[test]
    fn prop_transient_errors_retry_to_budget(ctx in arb_context()) {
        let turns: Vec<Turn> = (0..10).map(|_| Turn::Fail(LlmErrorKind::Network)).collect();
        let trace = drive(&ctx, &turns);
        prop_assert_eq!(trace.model_requests, ctx.max_retries as usize + 1);
        let unavailable = matches!(
            trace.states.last(),
            Some(LoopState::Failed { failure: LoopFailure { category: FailureCategory::ProviderUnavailable, .. } })
        );
        prop_assert!(unavailable);
    }

    /// A tool-calling model hits the iteration limit after exactly
    /// `max_iterations` batches and no further model call is made
    #[test]
    fn prop_endless_tool_calls_hit_limit(ctx in arb_context(), batch in 1usize..3) {
        let turns: Vec<Turn> = (0..20).map(|_| Turn::Calls(batch)).collect();
        let trace = drive(&ctx, &turns);
        prop_assert_eq!(trace.model_requests, ctx.max_iterations as usize + 1);
        let limited = matches!(
            trace.states.last(),
            Some(LoopState::Failed { failure: LoopFailure { category: FailureCategory::IterationLimit, .. } })
        );
        prop_assert!(limited);
    }
}
