//! Prompt construction for the reasoning roles.
//!
//! Role system prompts carry the behaviour definition plus the required JSON
//! response shape rendered from the role's output schema. The state message
//! builder packs the page snapshot, step counters and prior action outcomes
//! into the single transient user message each step shows the model.

use chrono::Utc;
use schemars::JsonSchema;

use crate::browser::{ActionOutcome, PageState};
use crate::context::StepInfo;
use crate::messages::AgentMessage;

/// Longest error tail folded into context, to bound growth.
pub const MAX_ERROR_TAIL_CHARS: usize = 300;

const PLANNER_ROLE: &str = "\
You are the planning role of a web task automation system. You assess overall \
progress toward the user's objective and decide what should happen next. You \
never take browser actions yourself; your next_steps guidance is handed to \
the navigation role. Set done to true only once the objective is satisfied, \
and web_task to false when the objective needs no browser interaction at all.";

const NAVIGATOR_ROLE: &str = "\
You are the navigation role of a web task automation system. Each step you \
receive the current page state: an indexed tree of interactive elements, \
scroll context, open tabs and the outcomes of your previous actions. Decide \
a short ordered batch of browser actions that advances the task, referencing \
elements only by their bracketed indices. Indices change when the page \
changes, so never reuse indices from earlier states.";

const VALIDATOR_ROLE: &str = "\
You are the validation role of a web task automation system. Judge strictly \
whether the stated task has actually been achieved given the conversation \
and the current page state. Do not give the benefit of the doubt: if the \
evidence is incomplete, report is_valid as false and explain what is \
missing. When the task is complete, put the final answer for the user in \
the answer field.";

/// Render a role's output schema as a pretty JSON block.
pub fn schema_block<T: JsonSchema>() -> String {
    let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string())
}

/// Assemble a role system prompt: behaviour definition plus response format.
fn role_prompt(role: &str, schema: String) -> String {
    format!(
        "{role}\n\n## Response Format\nRespond with a single JSON object (no \
surrounding prose) that validates against this schema. Every field is \
required.\n\n```json\n{schema}\n```"
    )
}

/// System prompt for the Planner.
pub fn planner_system_prompt() -> String {
    role_prompt(
        PLANNER_ROLE,
        schema_block::<crate::agents::PlannerDecision>(),
    )
}

/// System prompt for the Navigator. This is also the message history's base
/// system message.
pub fn navigator_system_prompt() -> String {
    role_prompt(
        NAVIGATOR_ROLE,
        schema_block::<crate::agents::NavigationDecision>(),
    )
}

/// System prompt for the Validator, parameterised by the task under judgment.
pub fn validator_system_prompt(task: &str) -> String {
    role_prompt(
        &format!("{VALIDATOR_ROLE}\n\nTask to validate: {task}"),
        schema_block::<crate::agents::ValidationVerdict>(),
    )
}

/// Keep only the last [`MAX_ERROR_TAIL_CHARS`] characters of an error.
pub fn error_tail(error: &str) -> String {
    let count = error.chars().count();
    if count <= MAX_ERROR_TAIL_CHARS {
        error.to_string()
    } else {
        let tail: String = error.chars().skip(count - MAX_ERROR_TAIL_CHARS).collect();
        format!("...{tail}")
    }
}

/// Build the transient user message describing the current page state.
///
/// Shown to the model exactly once; the durable record of the step is the
/// compact assistant summary the executor writes after the Navigator
/// decides.
pub fn build_state_message(
    state: &PageState,
    step: StepInfo,
    action_results: &[ActionOutcome],
    use_vision: bool,
) -> AgentMessage {
    let mut text = String::new();
    text.push_str("[Task history ends here]\n[Current state starts here]\n");
    text.push_str(
        "You will see the following only once - write anything you need to \
remember into your memory field:\n",
    );

    text.push_str(&format!(
        "Current tab: {{id: {}, url: {}, title: {}}}\n",
        state.tab_id,
        state.url,
        state.title.as_deref().unwrap_or("(untitled)")
    ));
    if !state.tabs.is_empty() {
        text.push_str("Other available tabs:\n");
        for tab in &state.tabs {
            text.push_str(&format!(
                " - {{id: {}, url: {}, title: {}}}\n",
                tab.id, tab.url, tab.title
            ));
        }
    }

    text.push_str("Interactive elements from current page:\n");
    if state.element_tree.is_empty() {
        text.push_str("empty page\n");
    } else {
        if state.pixels_above > 0 {
            text.push_str(&format!(
                "... {} pixels above - scroll up to see more ...\n",
                state.pixels_above
            ));
        } else {
            text.push_str("[Start of page]\n");
        }
        text.push_str(&state.element_tree);
        text.push('\n');
        if state.pixels_below > 0 {
            text.push_str(&format!(
                "... {} pixels below - scroll down to see more ...\n",
                state.pixels_below
            ));
        } else {
            text.push_str("[End of page]\n");
        }
    }

    text.push_str(&format!(
        "Current step: {}/{}\n",
        step.step_number, step.max_steps
    ));
    text.push_str(&format!(
        "Current date and time: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M")
    ));

    let total = action_results.len();
    for (i, result) in action_results.iter().enumerate() {
        if let Some(ref content) = result.extracted_content {
            text.push_str(&format!("Action result {}/{}: {}\n", i + 1, total, content));
        }
        if let Some(ref error) = result.error {
            text.push_str(&format!(
                "Action error {}/{}: {}\n",
                i + 1,
                total,
                error_tail(error)
            ));
        }
    }

    let message = AgentMessage::user(text);
    match (use_vision, &state.screenshot_base64) {
        (true, Some(screenshot)) => message.with_image(screenshot.clone()),
        _ => message,
    }
}
