//! Validator role: independent judgment of task completion.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::errors::AgentError;
use crate::events::{Actor, ExecutionState};
use crate::messages::{AgentMessage, MessageHistory};
use crate::model_client::ModelClient;
use crate::prompts;

/// Validator output. All fields are mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ValidationVerdict {
    /// Whether the task objective has actually been satisfied.
    pub is_valid: bool,
    /// Rationale for the judgment.
    pub reason: String,
    /// Final answer for the user when the task is complete, empty otherwise.
    pub answer: String,
}

/// Guards against the Planner or Navigator declaring success prematurely.
pub struct ValidatorAgent {
    client: Arc<dyn ModelClient>,
}

impl ValidatorAgent {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Judge completion over the conversation plus a freshly built state
    /// message (not stored in the durable history).
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        history: &MessageHistory,
        task: &str,
        state_message: AgentMessage,
    ) -> Result<ValidationVerdict, AgentError> {
        ctx.emit(
            Actor::Validator,
            ExecutionState::StepStart,
            "Validating...",
        );
        tracing::debug!(messages = history.len(), "invoking validator");

        let mut messages = history.for_role(&prompts::validator_system_prompt(task));
        messages.push(state_message);

        match super::invoke_structured::<ValidationVerdict>(&self.client, &messages).await {
            Ok(verdict) => {
                tracing::info!(is_valid = verdict.is_valid, "validation verdict");
                let data = if verdict.is_valid {
                    verdict.answer.clone()
                } else {
                    verdict.reason.clone()
                };
                ctx.emit(Actor::Validator, ExecutionState::StepOk, data);
                Ok(verdict)
            }
            Err(err) if err.is_authentication() => Err(err),
            Err(err) => {
                tracing::warn!(%err, "validation failed");
                ctx.emit(
                    Actor::Validator,
                    ExecutionState::StepFail,
                    format!("Validation failed: {err}"),
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
    use crate::model_client::ScriptedModelClient;
    use webpilot_core_types::TaskId;

    fn verdict_json(is_valid: bool) -> String {
        format!(
            r#"{{"is_valid": {is_valid}, "reason": "checked the page",
                 "answer": "The weather is 21C"}}"#
        )
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            TaskId::new(),
            ExecutionOptions::minimal(),
            EventSink::new(),
        )
    }

    #[tokio::test]
    async fn test_validator_positive_verdict() {
        let client = Arc::new(ScriptedModelClient::repeating(verdict_json(true)));
        let validator = ValidatorAgent::new(client);
        let ctx = context();
        let mut rx = ctx.sink().subscribe();
        let history = MessageHistory::new("sys");

        let verdict = validator
            .execute(&ctx, &history, "get the weather", AgentMessage::user("state"))
            .await
            .unwrap();
        assert!(verdict.is_valid);
        assert_eq!(verdict.answer, "The weather is 21C");

        rx.recv().await.unwrap(); // step-start
        let ok = rx.recv().await.unwrap();
        assert_eq!(ok.state, ExecutionState::StepOk);
        assert_eq!(ok.data, "The weather is 21C");
    }

    #[tokio::test]
    async fn test_validator_negative_verdict_reports_reason() {
        let client = Arc::new(ScriptedModelClient::repeating(verdict_json(false)));
        let validator = ValidatorAgent::new(client);
        let ctx = context();
        let mut rx = ctx.sink().subscribe();
        let history = MessageHistory::new("sys");

        let verdict = validator
            .execute(&ctx, &history, "get the weather", AgentMessage::user("state"))
            .await
            .unwrap();
        assert!(!verdict.is_valid);

        rx.recv().await.unwrap(); // step-start
        let ok = rx.recv().await.unwrap();
        assert_eq!(ok.data, "checked the page");
    }
}
