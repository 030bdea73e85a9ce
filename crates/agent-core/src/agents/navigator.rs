//! Navigator role: turns planner guidance and page state into an action
//! batch.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::browser::ActionDirective;
use crate::context::ExecutionContext;
use crate::errors::AgentError;
use crate::events::{Actor, ExecutionState};
use crate::messages::MessageHistory;
use crate::model_client::ModelClient;

/// Navigator output. All fields are mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NavigationDecision {
    /// Assessment of whether the previous step's goal was achieved.
    pub evaluation_previous_goal: String,
    /// Facts worth carrying forward to later steps.
    pub memory: String,
    /// Immediate objective for this step's actions.
    pub next_goal: String,
    /// Ordered batch of browser actions to execute.
    pub actions: Vec<ActionDirective>,
}

impl NavigationDecision {
    /// Compact one-line record of the decision, kept in history after the
    /// transient state message is dropped.
    pub fn summary(&self) -> String {
        let names: Vec<&str> = self.actions.iter().map(|a| a.name.as_str()).collect();
        format!(
            "Evaluation: {} | Memory: {} | Next goal: {} | Actions: [{}]",
            self.evaluation_previous_goal,
            self.memory,
            self.next_goal,
            names.join(", ")
        )
    }
}

/// Decides concrete browser actions from the conversation and current page
/// state. The message history's base system message already defines this
/// role, so the history is consumed as-is.
pub struct NavigatorAgent {
    client: Arc<dyn ModelClient>,
}

impl NavigatorAgent {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Run one navigation pass. The caller has already appended the
    /// transient state message as the newest history entry.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        history: &MessageHistory,
    ) -> Result<NavigationDecision, AgentError> {
        ctx.emit(Actor::Navigator, ExecutionState::StepStart, "Navigating...");
        tracing::debug!(messages = history.len(), "invoking navigator");

        match super::invoke_structured::<NavigationDecision>(&self.client, history.messages())
            .await
        {
            Ok(decision) => {
                tracing::info!(
                    actions = decision.actions.len(),
                    next_goal = %decision.next_goal,
                    "navigation decision"
                );
                ctx.emit(
                    Actor::Navigator,
                    ExecutionState::StepOk,
                    decision.next_goal.clone(),
                );
                Ok(decision)
            }
            Err(err) if err.is_authentication() => Err(err),
            Err(err) => {
                tracing::warn!(%err, "navigation failed");
                ctx.emit(
                    Actor::Navigator,
                    ExecutionState::StepFail,
                    format!("Navigation failed: {err}"),
                );
                Err(err)
            }
        }
    }
}
