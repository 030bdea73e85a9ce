//! Shared mutable state for one task execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use webpilot_core_types::TaskId;

use crate::browser::ActionOutcome;
use crate::events::{Actor, EventSink, ExecutionState};

/// Policy knobs supplied by the settings collaborator at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Step ceiling before the run fails for budget exhaustion.
    pub max_steps: u32,

    /// Consecutive-failure ceiling before the run fails.
    pub max_failures: u32,

    /// Upper bound on the Navigator's action batch per step.
    pub max_actions_per_step: usize,

    /// Whether screenshots are captured and attached to state messages.
    pub use_vision: bool,

    /// Whether the Planner also receives screenshot content.
    pub use_vision_for_planner: bool,

    /// Planner re-invocation cadence, in steps.
    pub planning_interval: u32,

    /// Message-history bound before oldest non-system entries are evicted.
    pub max_history_messages: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_failures: 3,
            max_actions_per_step: 5,
            use_vision: true,
            use_vision_for_planner: false,
            planning_interval: 3,
            max_history_messages: 64,
        }
    }
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small ceilings for tests.
    pub fn minimal() -> Self {
        Self {
            max_steps: 5,
            max_failures: 2,
            max_actions_per_step: 2,
            use_vision: false,
            use_vision_for_planner: false,
            planning_interval: 2,
            max_history_messages: 16,
        }
    }

    /// Builder: set the step ceiling.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: set the failure-streak ceiling.
    pub fn max_failures(mut self, failures: u32) -> Self {
        self.max_failures = failures;
        self
    }

    /// Builder: set the per-step action bound.
    pub fn actions_per_step(mut self, count: usize) -> Self {
        self.max_actions_per_step = count;
        self
    }

    /// Builder: set vision mode.
    pub fn vision(mut self, enabled: bool) -> Self {
        self.use_vision = enabled;
        self
    }

    /// Builder: set the planner cadence.
    pub fn planning_interval(mut self, interval: u32) -> Self {
        self.planning_interval = interval.max(1);
        self
    }
}

/// Current step index and ceiling, surfaced to agents for situational
/// awareness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepInfo {
    /// 1-based step number.
    pub step_number: u32,
    pub max_steps: u32,
}

/// Asynchronously settable control flags, polled by the loop at step
/// boundaries.
#[derive(Debug)]
pub struct ControlFlags {
    paused: AtomicBool,
    cancel: Mutex<CancellationToken>,
    resume: Notify,
}

impl ControlFlags {
    fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            resume: Notify::new(),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume.notify_one();
    }

    pub fn cancel(&self) {
        self.cancel.lock().cancel();
        // Wake a paused loop so cancellation is not blocked by pause.
        self.resume.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_cancelled()
    }

    /// Clear both flags for a follow-up run.
    fn reset(&self) {
        self.paused.store(false, Ordering::SeqCst);
        let mut cancel = self.cancel.lock();
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
    }

    /// Wait until the pause flag clears or cancellation is requested.
    pub async fn wait_while_paused(&self) {
        loop {
            if !self.is_paused() || self.is_cancelled() {
                return;
            }
            let token = self.cancel.lock().clone();
            tokio::select! {
                _ = self.resume.notified() => {}
                _ = token.cancelled() => {}
            }
        }
    }
}

/// Cloneable handle the host uses to signal the loop from outside.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    flags: Arc<ControlFlags>,
}

impl ControlHandle {
    pub fn pause(&self) {
        self.flags.pause();
    }

    pub fn resume(&self) {
        self.flags.resume();
    }

    pub fn cancel(&self) {
        self.flags.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.flags.is_paused()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.is_cancelled()
    }
}

/// Per-task mutable aggregate owned exclusively by the executor.
pub struct ExecutionContext {
    pub task_id: TaskId,
    pub options: ExecutionOptions,

    /// Completed step count.
    pub step_number: u32,

    /// Length of the current failure streak.
    pub consecutive_failures: u32,

    /// Outcomes of the most recent step's actions, consumed by the next
    /// step's state message.
    pub action_results: Vec<ActionOutcome>,

    flags: Arc<ControlFlags>,
    sink: EventSink,
}

impl ExecutionContext {
    pub fn new(task_id: TaskId, options: ExecutionOptions, sink: EventSink) -> Self {
        Self {
            task_id,
            options,
            step_number: 0,
            consecutive_failures: 0,
            action_results: Vec::new(),
            flags: Arc::new(ControlFlags::new()),
            sink,
        }
    }

    pub fn emit(&self, actor: Actor, state: ExecutionState, data: impl Into<String>) {
        self.sink.emit(actor, state, data);
    }

    pub fn sink(&self) -> &EventSink {
        &self.sink
    }

    pub fn control(&self) -> ControlHandle {
        ControlHandle {
            flags: Arc::clone(&self.flags),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.flags.is_paused()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.is_cancelled()
    }

    pub async fn wait_while_paused(&self) {
        self.flags.wait_while_paused().await;
    }

    /// Step info for the step about to run.
    pub fn step_info(&self, step_number: u32) -> StepInfo {
        StepInfo {
            step_number,
            max_steps: self.options.max_steps,
        }
    }

    /// Reset counters and control flags for a follow-up objective.
    pub fn reset_for_follow_up(&mut self) {
        self.step_number = 0;
        self.consecutive_failures = 0;
        self.action_results.clear();
        self.flags.reset();
    }
}
