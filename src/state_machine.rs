//! Tool-use orchestration state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `AwaitingModel → InspectingResponse → (DispatchingTool → AwaitingModel)
//! | Done | Failed`.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{FailureCategory, LoopContext, LoopFailure, LoopState};
pub use transition::transition;
