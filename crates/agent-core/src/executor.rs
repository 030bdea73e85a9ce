//! Task execution orchestrator.
//!
//! Sequences the Planner, Navigator and Validator into a bounded step loop
//! over shared conversation state, applies the stopping and retry policy,
//! and exposes the pausable/cancellable/resumable lifecycle. Control flags
//! are observed only at step boundaries, so an in-flight model call or
//! action batch always finishes before a pause or cancellation takes
//! effect.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use webpilot_core_types::TaskId;

use crate::agents::{
    NavigatorAgent, PlannerAgent, PlannerDecision, ValidationVerdict, ValidatorAgent,
};
use crate::browser::AutomationSession;
use crate::context::{ControlHandle, ExecutionContext, ExecutionOptions};
use crate::errors::AgentError;
use crate::events::{Actor, EventSink, ExecutionEvent, ExecutionState};
use crate::messages::{AgentMessage, MessageHistory};
use crate::model_client::ModelClient;
use crate::prompts;

/// Lifecycle states of one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Constructed but not yet running, or reset for a follow-up task.
    Idle,
    /// The step loop is driving.
    Running,
    /// Paused at a step boundary, waiting for resume or cancel.
    Paused,
    /// Planner reported done and the Validator concurred.
    Completed,
    /// Budget exhausted or a non-retryable error occurred.
    Failed,
    /// Cancellation was observed at a step boundary.
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Per-role model bindings. Each role may be backed by an independently
/// configured client.
#[derive(Clone)]
pub struct RoleClients {
    pub planner: Arc<dyn ModelClient>,
    pub navigator: Arc<dyn ModelClient>,
    pub validator: Arc<dyn ModelClient>,
}

impl RoleClients {
    pub fn new(
        planner: Arc<dyn ModelClient>,
        navigator: Arc<dyn ModelClient>,
        validator: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            planner,
            navigator,
            validator,
        }
    }

    /// Bind every role to the same client.
    pub fn shared(client: Arc<dyn ModelClient>) -> Self {
        Self {
            planner: Arc::clone(&client),
            navigator: Arc::clone(&client),
            validator: client,
        }
    }
}

/// Owns the execution context and message history for one task (including
/// follow-ups) and drives the step loop to a terminal condition.
pub struct Executor {
    ctx: ExecutionContext,
    history: MessageHistory,
    task: String,
    planner: PlannerAgent,
    navigator: NavigatorAgent,
    validator: ValidatorAgent,
    session: Arc<dyn AutomationSession>,
    status: ExecutionStatus,
    last_plan: Option<PlannerDecision>,
    planner_done: bool,
}

impl Executor {
    pub fn new(
        task_id: TaskId,
        task: impl Into<String>,
        session: Arc<dyn AutomationSession>,
        clients: RoleClients,
        options: ExecutionOptions,
    ) -> Self {
        let task = task.into();
        let sink = EventSink::new();
        let mut history = MessageHistory::with_max_messages(
            prompts::navigator_system_prompt(),
            options.max_history_messages,
        );
        history.push(AgentMessage::user(format!("Your task is: {task}")));

        Self {
            ctx: ExecutionContext::new(task_id, options, sink),
            history,
            task,
            planner: PlannerAgent::new(clients.planner),
            navigator: NavigatorAgent::new(clients.navigator),
            validator: ValidatorAgent::new(clients.validator),
            session,
            status: ExecutionStatus::Idle,
            last_plan: None,
            planner_done: false,
        }
    }

    /// Attach an event subscriber, replacing any prior one.
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        self.ctx.sink().subscribe()
    }

    /// Detach the current event subscriber.
    pub fn clear_event_subscription(&self) {
        self.ctx.sink().clear_subscription();
    }

    /// Cloneable handle for signalling pause/resume/cancel from outside the
    /// loop.
    pub fn control(&self) -> ControlHandle {
        self.ctx.control()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn task_id(&self) -> &TaskId {
        &self.ctx.task_id
    }

    /// Conversation accumulated so far, including prior follow-ups.
    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Request a pause; honoured at the next step boundary.
    pub fn pause(&self) {
        self.control().pause();
    }

    /// Clear a pause request and wake the loop.
    pub fn resume(&self) {
        self.control().resume();
    }

    /// Request cancellation; honoured at the next step boundary, and
    /// immediately aborts a pause wait.
    pub fn cancel(&self) {
        self.control().cancel();
    }

    /// Append a new objective to the finished run's conversation and reset
    /// the counters for another `run()` cycle.
    pub fn add_follow_up_task(&mut self, task: impl Into<String>) -> Result<(), AgentError> {
        if !self.status.is_terminal() {
            return Err(AgentError::invalid_state(
                "follow-up tasks can only be added after a run has finished",
            ));
        }
        let task = task.into();
        tracing::info!(task_id = %self.ctx.task_id, "follow-up task attached");
        self.history
            .push(AgentMessage::user(format!("New follow-up task: {task}")));
        self.task = task;
        self.last_plan = None;
        self.planner_done = false;
        self.ctx.reset_for_follow_up();
        self.status = ExecutionStatus::Idle;
        Ok(())
    }

    /// Release the automation session and detach event subscriptions.
    pub async fn cleanup(&mut self) -> Result<(), AgentError> {
        tracing::debug!(task_id = %self.ctx.task_id, "releasing executor resources");
        self.ctx.sink().clear_subscription();
        self.session.close().await
    }

    /// Drive the step loop until a terminal condition.
    ///
    /// All policy-level failures are reported through the event bus and the
    /// returned status; the only `Err` this method produces is the
    /// programming-invariant violation of calling it while not idle.
    pub async fn run(&mut self) -> Result<ExecutionStatus, AgentError> {
        if self.status != ExecutionStatus::Idle {
            return Err(AgentError::invalid_state(format!(
                "run() requires an idle executor (status: {:?})",
                self.status
            )));
        }
        self.status = ExecutionStatus::Running;
        tracing::info!(task_id = %self.ctx.task_id, task = %self.task, "task execution started");

        loop {
            // Step boundary: the only points where control signals and
            // budget ceilings are observed.
            if self.ctx.is_cancelled() {
                return Ok(self.finish_cancelled());
            }
            if self.ctx.is_paused() {
                self.ctx
                    .emit(Actor::System, ExecutionState::TaskPause, "Task paused");
                self.status = ExecutionStatus::Paused;
                self.ctx.wait_while_paused().await;
                if self.ctx.is_cancelled() {
                    return Ok(self.finish_cancelled());
                }
                self.ctx
                    .emit(Actor::System, ExecutionState::TaskResume, "Task resumed");
                self.status = ExecutionStatus::Running;
            }
            if self.ctx.step_number >= self.ctx.options.max_steps {
                return Ok(self.finish_failed(format!(
                    "reached maximum steps ({})",
                    self.ctx.options.max_steps
                )));
            }
            if self.ctx.consecutive_failures >= self.ctx.options.max_failures {
                return Ok(self.finish_failed(format!(
                    "{} consecutive step failures",
                    self.ctx.consecutive_failures
                )));
            }

            let current_step = self.ctx.step_number + 1;
            tracing::debug!(step = current_step, "step started");
            let mut step_error: Option<AgentError> = None;

            // (a) Planner, when due by cadence and completion is not
            // already claimed.
            if self.planner_due(current_step) && !self.planner_done {
                match self.planner.execute(&self.ctx, &self.history).await {
                    Ok(decision) => {
                        self.history.push(AgentMessage::assistant(format!(
                            "Plan: {}",
                            decision.next_steps
                        )));
                        self.planner_done = decision.done;
                        self.last_plan = Some(decision);
                    }
                    Err(err) if err.is_authentication() => {
                        return Ok(self.finish_failed(err.to_string()))
                    }
                    Err(err) => step_error = Some(err),
                }
            }

            // (b) Navigator, while the objective is not judged satisfied.
            if step_error.is_none() && !self.planner_done {
                match self.navigate_step(current_step).await {
                    Ok(()) => {}
                    Err(err) if err.is_authentication() => {
                        return Ok(self.finish_failed(err.to_string()))
                    }
                    Err(err) => step_error = Some(err),
                }
            }

            // (c) Validator corroborates claimed completion. Both roles
            // must agree before the run completes; a dissenting verdict
            // sends its reason back into the conversation and the loop
            // continues.
            if step_error.is_none() && self.planner_done {
                match self.validate_step(current_step).await {
                    Ok(verdict) if verdict.is_valid => {
                        self.ctx.step_number += 1;
                        return Ok(self.finish_completed(verdict));
                    }
                    Ok(verdict) => {
                        self.planner_done = false;
                        self.history.push(AgentMessage::user(format!(
                            "Completion rejected by validation: {}",
                            verdict.reason
                        )));
                    }
                    Err(err) if err.is_authentication() => {
                        return Ok(self.finish_failed(err.to_string()))
                    }
                    Err(err) => step_error = Some(err),
                }
            }

            // (d) + (e): advance the counter; any role failure extends the
            // streak, a clean step resets it.
            self.ctx.step_number += 1;
            match step_error {
                Some(err) => {
                    self.ctx.consecutive_failures += 1;
                    tracing::warn!(
                        step = current_step,
                        failures = self.ctx.consecutive_failures,
                        %err,
                        "step failed"
                    );
                }
                None => self.ctx.consecutive_failures = 0,
            }
        }
    }

    fn planner_due(&self, current_step: u32) -> bool {
        current_step == 1 || current_step % self.ctx.options.planning_interval == 0
    }

    /// Observe the page, let the Navigator decide, and dispatch its batch.
    async fn navigate_step(&mut self, current_step: u32) -> Result<(), AgentError> {
        let include_screenshot = self.ctx.options.use_vision;
        let state = match self.session.page_state(include_screenshot).await {
            Ok(state) => state,
            Err(err) => {
                self.ctx.emit(
                    Actor::Navigator,
                    ExecutionState::StepFail,
                    format!("Observation failed: {err}"),
                );
                return Err(err);
            }
        };

        let state_message = prompts::build_state_message(
            &state,
            self.ctx.step_info(current_step),
            &self.ctx.action_results,
            include_screenshot,
        );
        self.history.push(state_message);
        let decision = self.navigator.execute(&self.ctx, &self.history).await;
        // The page snapshot is shown once; the durable record is the
        // compact decision summary.
        self.history.pop();
        let decision = decision?;
        self.history.push(AgentMessage::assistant(decision.summary()));

        let max_actions = self.ctx.options.max_actions_per_step;
        if decision.actions.len() > max_actions {
            tracing::debug!(
                requested = decision.actions.len(),
                max = max_actions,
                "action batch truncated"
            );
        }

        let mut outcomes = Vec::new();
        for action in decision.actions.iter().take(max_actions) {
            tracing::debug!(action = %action.name, "dispatching action");
            match self.session.dispatch(action).await {
                Ok(outcome) => {
                    let failed = outcome.is_error();
                    outcomes.push(outcome);
                    // An action failure may have invalidated what the rest
                    // of the batch was decided against.
                    if failed {
                        break;
                    }
                }
                Err(err) => {
                    self.ctx.action_results = outcomes;
                    self.ctx.emit(
                        Actor::Navigator,
                        ExecutionState::StepFail,
                        format!("Action dispatch failed: {err}"),
                    );
                    return Err(err);
                }
            }
        }
        self.ctx.action_results = outcomes;
        Ok(())
    }

    /// Ask the Validator to corroborate completion against fresh page state.
    async fn validate_step(&mut self, current_step: u32) -> Result<ValidationVerdict, AgentError> {
        let web_task = self.last_plan.as_ref().map(|p| p.web_task).unwrap_or(true);
        let state_message = if web_task {
            match self.session.page_state(self.ctx.options.use_vision).await {
                Ok(state) => prompts::build_state_message(
                    &state,
                    self.ctx.step_info(current_step),
                    &self.ctx.action_results,
                    self.ctx.options.use_vision,
                ),
                Err(err) => {
                    self.ctx.emit(
                        Actor::Validator,
                        ExecutionState::StepFail,
                        format!("Observation failed: {err}"),
                    );
                    return Err(err);
                }
            }
        } else {
            // No browser involved: the planner's observation stands in for
            // page state.
            let observation = self
                .last_plan
                .as_ref()
                .map(|p| p.observation.clone())
                .unwrap_or_default();
            AgentMessage::user(format!("Planner observation: {observation}"))
        };

        self.validator
            .execute(&self.ctx, &self.history, &self.task, state_message)
            .await
    }

    fn finish_completed(&mut self, verdict: ValidationVerdict) -> ExecutionStatus {
        let data = if verdict.answer.is_empty() {
            "Task completed".to_string()
        } else {
            verdict.answer
        };
        tracing::info!(steps = self.ctx.step_number, "task completed");
        self.ctx.emit(Actor::System, ExecutionState::TaskOk, data);
        self.status = ExecutionStatus::Completed;
        self.status
    }

    fn finish_failed(&mut self, reason: String) -> ExecutionStatus {
        tracing::warn!(steps = self.ctx.step_number, %reason, "task failed");
        self.ctx.emit(
            Actor::System,
            ExecutionState::TaskFail,
            format!("Task failed: {reason}"),
        );
        self.status = ExecutionStatus::Failed;
        self.status
    }

    fn finish_cancelled(&mut self) -> ExecutionStatus {
        tracing::info!(steps = self.ctx.step_number, "task cancelled");
        self.ctx.emit(
            Actor::System,
            ExecutionState::TaskCancel,
            "Task cancelled by user",
        );
        self.status = ExecutionStatus::Cancelled;
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockAutomationSession;
    use crate::model_client::ScriptedModelClient;

    fn executor_with(options: ExecutionOptions) -> Executor {
        let client = Arc::new(ScriptedModelClient::repeating("{}"));
        Executor::new(
            TaskId::new(),
            "test task",
            Arc::new(MockAutomationSession::new()),
            RoleClients::shared(client),
            options,
        )
    }

    #[test]
    fn test_planner_cadence() {
        let executor = executor_with(ExecutionOptions::default().planning_interval(3));
        assert!(executor.planner_due(1));
        assert!(!executor.planner_due(2));
        assert!(executor.planner_due(3));
        assert!(!executor.planner_due(4));
        assert!(!executor.planner_due(5));
        assert!(executor.planner_due(6));
    }

    #[test]
    fn test_follow_up_rejected_before_terminal_state() {
        let mut executor = executor_with(ExecutionOptions::minimal());
        let err = executor.add_follow_up_task("more work").unwrap_err();
        assert!(matches!(err, AgentError::InvalidState(_)));
    }

    #[test]
    fn test_history_seeded_with_system_and_task() {
        let executor = executor_with(ExecutionOptions::minimal());
        let messages = executor.history().messages();
        assert_eq!(messages[0].role, crate::messages::MessageRole::System);
        assert!(messages[1].text.contains("test task"));
    }

    #[tokio::test]
    async fn test_run_twice_is_an_invariant_violation() {
        let mut executor = executor_with(ExecutionOptions::minimal().max_steps(1));
        let status = executor.run().await.unwrap();
        assert_eq!(status, ExecutionStatus::Failed);

        let err = executor.run().await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidState(_)));
    }
}
