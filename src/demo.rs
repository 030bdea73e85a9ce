//! Offline demo wiring: a scripted model backend and a mock automation
//! session driving one full task lifecycle end to end.

use std::sync::Arc;

use agent_core::{
    AutomationSession, ExecutionOptions, ExecutionStatus, Executor, MockAutomationSession,
    ModelClient, RoleClients, ScriptedModelClient, ScriptedResponse,
};
use webpilot_core_types::TaskId;

/// Scripted role bindings replaying a short successful run: the Planner
/// plans twice, the Navigator acts in between, the Validator confirms.
pub fn demo_clients() -> RoleClients {
    let planner = ScriptedModelClient::new(vec![
        ScriptedResponse::text(
            r#"{"observation": "Fresh session on the target page.",
                "challenges": "None so far.",
                "done": false,
                "next_steps": "Open the first result and read it.",
                "reasoning": "Nothing has been done yet.",
                "web_task": true}"#,
        ),
        ScriptedResponse::text(
            r#"{"observation": "The requested content is on screen.",
                "challenges": "None.",
                "done": true,
                "next_steps": "Nothing further.",
                "reasoning": "The objective has been met.",
                "web_task": true}"#,
        ),
    ]);
    let navigator = ScriptedModelClient::new(vec![ScriptedResponse::text(
        r#"{"evaluation_previous_goal": "Fresh start, nothing to evaluate.",
            "memory": "Target link is element [0].",
            "next_goal": "Open the link.",
            "actions": [{"action": "click", "element_index": 0}]}"#,
    )]);
    let validator = ScriptedModelClient::new(vec![ScriptedResponse::text(
        r#"{"is_valid": true,
            "reason": "The page shows the requested content.",
            "answer": "Found it - the demo task is complete."}"#,
    )]);

    RoleClients::new(
        Arc::new(planner) as Arc<dyn ModelClient>,
        Arc::new(navigator) as Arc<dyn ModelClient>,
        Arc::new(validator) as Arc<dyn ModelClient>,
    )
}

/// Run one task (and an optional follow-up) against the offline backend,
/// printing every execution event as it arrives.
pub async fn run_demo_task(
    task: &str,
    follow_up: Option<&str>,
    options: ExecutionOptions,
) -> anyhow::Result<ExecutionStatus> {
    let session = Arc::new(MockAutomationSession::new());
    let mut executor = Executor::new(
        TaskId::new(),
        task,
        Arc::clone(&session) as Arc<dyn AutomationSession>,
        demo_clients(),
        options,
    );

    let mut events = executor.subscribe_events();
    let printer = tokio::spawn(async move {
        // Runs until cleanup detaches the subscription.
        while let Some(event) = events.recv().await {
            println!(
                "{} {:<9} {:>11} | {}",
                event.timestamp.format("%H:%M:%S%.3f"),
                event.actor.to_string(),
                format!("{:?}", event.state),
                event.data
            );
        }
    });

    let mut status = executor.run().await?;
    tracing::info!(?status, "run finished");

    if let Some(follow_up) = follow_up {
        executor.add_follow_up_task(follow_up)?;
        status = executor.run().await?;
        tracing::info!(?status, "follow-up run finished");
    }

    executor.cleanup().await?;
    printer.await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_run_completes() {
        let status = run_demo_task("demo objective", None, ExecutionOptions::minimal().vision(false))
            .await
            .unwrap();
        assert_eq!(status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_demo_run_with_follow_up() {
        // The scripted clients replay their final responses, so the
        // follow-up run also reaches completion.
        let status = run_demo_task(
            "demo objective",
            Some("and a follow-up"),
            ExecutionOptions::minimal(),
        )
        .await
        .unwrap();
        assert_eq!(status, ExecutionStatus::Completed);
    }
}
