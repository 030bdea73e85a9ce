//! Execution lifecycle events observable by the hosting collaborator.
//!
//! Events are the sole externally visible trace of orchestration progress:
//! the host learns about step results and terminal outcomes exclusively by
//! subscribing to the bus, never by inspecting executor internals.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use webpilot_event_bus::SingleSlotBus;

/// Reasoning role (or the orchestrator itself) an event is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Planner,
    Navigator,
    Validator,
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Actor::Planner => "planner",
            Actor::Navigator => "navigator",
            Actor::Validator => "validator",
            Actor::System => "system",
        };
        write!(f, "{}", name)
    }
}

/// Fixed vocabulary of lifecycle markers carried by execution events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// A role began work within the current step.
    StepStart,
    /// A role finished its part of the step successfully.
    StepOk,
    /// A role failed within the step.
    StepFail,
    /// The task completed successfully.
    TaskOk,
    /// The task failed (budget exhaustion or a non-retryable error).
    TaskFail,
    /// The task was cancelled by the user.
    TaskCancel,
    /// The loop honoured a pause request at a step boundary.
    TaskPause,
    /// The loop resumed after a pause.
    TaskResume,
}

impl ExecutionState {
    /// Task-level states end the run; step-level states do not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TaskOk | Self::TaskFail | Self::TaskCancel)
    }
}

/// Immutable progress record published on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub actor: Actor,
    pub state: ExecutionState,
    /// Short human-readable payload.
    pub data: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(actor: Actor, state: ExecutionState, data: impl Into<String>) -> Self {
        Self {
            actor,
            state,
            data: data.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Publishing handle held by the execution context.
///
/// Emission never fails the caller: a missing or vanished subscriber is the
/// host's concern, not the step loop's.
#[derive(Clone)]
pub struct EventSink {
    bus: Arc<SingleSlotBus<ExecutionEvent>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self {
            bus: SingleSlotBus::new(),
        }
    }

    /// Attach a subscriber, replacing any prior one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        self.bus.subscribe()
    }

    /// Detach the current subscriber.
    pub fn clear_subscription(&self) {
        self.bus.clear();
    }

    pub fn emit(&self, actor: Actor, state: ExecutionState, data: impl Into<String>) {
        let event = ExecutionEvent::new(actor, state, data);
        tracing::debug!(
            actor = %event.actor,
            state = ?event.state,
            data = %event.data,
            "execution event"
        );
        if let Err(err) = self.bus.publish(event) {
            tracing::warn!(%err, "event dropped");
        }
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
