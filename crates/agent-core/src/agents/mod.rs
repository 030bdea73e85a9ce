//! Reasoning roles and the shared structured-output contract.
//!
//! Every role follows the same shape: build a conversation view, invoke its
//! model client, parse the reply against the role's output schema, and emit
//! step events tagged with its own actor identity. Schema validation
//! failures are execution errors; the contract never retries internally -
//! retry policy belongs to the executor and is bounded by the failure
//! streak ceiling.

mod navigator;
mod planner;
mod validator;

pub use navigator::{NavigationDecision, NavigatorAgent};
pub use planner::{PlannerAgent, PlannerDecision};
pub use validator::{ValidationVerdict, ValidatorAgent};

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::errors::AgentError;
use crate::messages::AgentMessage;
use crate::model_client::ModelClient;

/// Locate the first JSON object in raw model text, tolerating markdown
/// fences and surrounding prose.
fn extract_json_block(raw: &str) -> Result<&str, AgentError> {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let block = match rest.find("```") {
            Some(end) => &rest[..end],
            None => rest,
        };
        return Ok(block.trim());
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&trimmed[start..=end]),
        _ => Err(AgentError::schema("response contains no JSON object")),
    }
}

/// Parse a role's structured output from raw model text.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, AgentError> {
    let block = extract_json_block(raw)?;
    serde_json::from_str(block).map_err(|err| AgentError::schema(err.to_string()))
}

/// Invoke a model client and validate its reply against `T`.
async fn invoke_structured<T: DeserializeOwned>(
    client: &Arc<dyn ModelClient>,
    messages: &[AgentMessage],
) -> Result<T, AgentError> {
    let raw = client.invoke(messages).await?;
    parse_structured(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        done: bool,
        note: String,
    }

    #[test]
    fn test_parse_bare_json() {
        let sample: Sample = parse_structured(r#"{"done": true, "note": "ok"}"#).unwrap();
        assert!(sample.done);
        assert_eq!(sample.note, "ok");
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "Here is my answer:\n```json\n{\"done\": false, \"note\": \"wip\"}\n```\n";
        let sample: Sample = parse_structured(raw).unwrap();
        assert!(!sample.done);
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let raw = "Sure. {\"done\": true, \"note\": \"found\"} Hope that helps!";
        let sample: Sample = parse_structured(raw).unwrap();
        assert_eq!(sample.note, "found");
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let err = parse_structured::<Sample>(r#"{"done": true}"#).unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation(_)));
    }

    #[test]
    fn test_unknown_field_is_schema_error() {
        let err =
            parse_structured::<Sample>(r#"{"done": true, "note": "x", "extra": 1}"#).unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation(_)));
    }

    #[test]
    fn test_no_json_at_all() {
        let err = parse_structured::<Sample>("I could not decide.").unwrap_err();
        assert!(matches!(err, AgentError::SchemaValidation(_)));
    }
}
