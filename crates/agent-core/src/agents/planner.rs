//! Planner role: progress assessment and next-step guidance.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::errors::AgentError;
use crate::events::{Actor, ExecutionState};
use crate::messages::MessageHistory;
use crate::model_client::ModelClient;
use crate::prompts;

/// Planner output. All fields are mandatory; a response missing any of them
/// fails schema validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PlannerDecision {
    /// What the planner observed about the current situation.
    pub observation: String,
    /// Obstacles standing between here and the objective.
    pub challenges: String,
    /// Whether the task objective is judged satisfied.
    pub done: bool,
    /// Guidance handed to the Navigator.
    pub next_steps: String,
    /// Rationale for the judgment.
    pub reasoning: String,
    /// Whether the objective requires browser interaction at all.
    pub web_task: bool,
}

/// Assesses overall task progress without taking browser actions itself.
pub struct PlannerAgent {
    client: Arc<dyn ModelClient>,
    system_prompt: String,
}

impl PlannerAgent {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            system_prompt: prompts::planner_system_prompt(),
        }
    }

    /// Override the default system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Run one planning pass over the conversation.
    ///
    /// The history's leading system message is replaced with the planner's
    /// own; image content is stripped from the newest message when vision is
    /// enabled globally but disabled for this role.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        history: &MessageHistory,
    ) -> Result<PlannerDecision, AgentError> {
        ctx.emit(Actor::Planner, ExecutionState::StepStart, "Planning...");
        tracing::debug!(messages = history.len(), "invoking planner");

        let mut messages = history.for_role(&self.system_prompt);
        if ctx.options.use_vision && !ctx.options.use_vision_for_planner {
            messages = MessageHistory::strip_trailing_image(messages);
        }

        match super::invoke_structured::<PlannerDecision>(&self.client, &messages).await {
            Ok(decision) => {
                tracing::info!(done = decision.done, "planner decision");
                ctx.emit(
                    Actor::Planner,
                    ExecutionState::StepOk,
                    decision.next_steps.clone(),
                );
                Ok(decision)
            }
            Err(err) if err.is_authentication() => Err(err),
            Err(err) => {
                tracing::warn!(%err, "planning failed");
                ctx.emit(
                    Actor::Planner,
                    ExecutionState::StepFail,
                    format!("Planning failed: {err}"),
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionOptions;
    use crate::events::EventSink;
    use crate::messages::AgentMessage;
    use crate::model_client::{ScriptedModelClient, ScriptedResponse};
    use webpilot_core_types::TaskId;

    fn planner_json(done: bool) -> String {
        format!(
            r#"{{"observation": "on the search page", "challenges": "none",
                 "done": {done}, "next_steps": "type the query",
                 "reasoning": "query not yet entered", "web_task": true}}"#
        )
    }

    fn context(options: ExecutionOptions) -> ExecutionContext {
        ExecutionContext::new(TaskId::new(), options, EventSink::new())
    }

    #[tokio::test]
    async fn test_planner_parses_decision_and_emits_events() {
        let client = Arc::new(ScriptedModelClient::repeating(planner_json(false)));
        let planner = PlannerAgent::new(client);
        let ctx = context(ExecutionOptions::minimal());
        let mut rx = ctx.sink().subscribe();
        let history = MessageHistory::new("navigator system");

        let decision = planner.execute(&ctx, &history).await.unwrap();
        assert!(!decision.done);
        assert!(decision.web_task);

        let start = rx.recv().await.unwrap();
        assert_eq!(start.actor, Actor::Planner);
        assert_eq!(start.state, ExecutionState::StepStart);
        let ok = rx.recv().await.unwrap();
        assert_eq!(ok.state, ExecutionState::StepOk);
        assert_eq!(ok.data, "type the query");
    }

    #[tokio::test]
    async fn test_planner_strips_image_when_vision_off_for_planner() {
        let client = Arc::new(ScriptedModelClient::repeating(planner_json(true)));
        let planner = PlannerAgent::new(client);
        let options = ExecutionOptions::minimal().vision(true);
        let ctx = context(options);

        let mut history = MessageHistory::new("navigator system");
        history.push(AgentMessage::user("state").with_image("c2hvdA=="));

        // The planner consumes a stripped view; the invocation succeeding at
        // all shows the prepared messages were accepted. The owned history
        // keeps its image.
        planner.execute(&ctx, &history).await.unwrap();
        assert!(history.messages().last().unwrap().image_base64.is_some());
    }

    #[tokio::test]
    async fn test_planner_auth_error_skips_step_fail_event() {
        let client = Arc::new(ScriptedModelClient::new(vec![
            ScriptedResponse::AuthFailure("key revoked".to_string()),
        ]));
        let planner = PlannerAgent::new(client);
        let ctx = context(ExecutionOptions::minimal());
        let mut rx = ctx.sink().subscribe();
        let history = MessageHistory::new("sys");

        let err = planner.execute(&ctx, &history).await.unwrap_err();
        assert!(err.is_authentication());

        // Only the step-start event was emitted; task-level failure is the
        // executor's to report.
        let start = rx.recv().await.unwrap();
        assert_eq!(start.state, ExecutionState::StepStart);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_planner_schema_failure_emits_step_fail() {
        let client = Arc::new(ScriptedModelClient::repeating("not json at all"));
        let planner = PlannerAgent::new(client);
        let ctx = context(ExecutionOptions::minimal());
        let mut rx = ctx.sink().subscribe();
        let history = MessageHistory::new("sys");

        let err = planner.execute(&ctx, &history).await.unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation(_)));

        rx.recv().await.unwrap(); // step-start
        let fail = rx.recv().await.unwrap();
        assert_eq!(fail.state, ExecutionState::StepFail);
        assert!(fail.data.starts_with("Planning failed"));
    }
}
