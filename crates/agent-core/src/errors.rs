use thiserror::Error;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Credentials rejected by a model provider. Non-retryable: repeating
    /// the call cannot change the outcome.
    #[error("model provider rejected credentials: {0}")]
    Authentication(String),

    /// Model invocation failed in transport or returned unusable output.
    #[error("model call failed: {0}")]
    Model(String),

    /// Model response did not match the role's declared output schema.
    #[error("response failed schema validation: {0}")]
    SchemaValidation(String),

    /// The browser automation collaborator failed to observe or act.
    #[error("automation failed: {0}")]
    Automation(String),

    /// Lifecycle API invoked out of order. This is a programming error and
    /// the only failure allowed to surface to the host as a hard fault.
    #[error("invalid lifecycle transition: {0}")]
    InvalidState(String),
}

impl AgentError {
    /// Helper for credential rejections.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    /// Helper for model transport failures.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// Helper for schema validation failures.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaValidation(message.into())
    }

    /// Helper for automation-layer failures.
    pub fn automation(message: impl Into<String>) -> Self {
        Self::Automation(message.into())
    }

    /// Helper for lifecycle misuse.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Authentication errors abort the run instead of counting toward the
    /// failure streak.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_classification() {
        assert!(AgentError::authentication("expired key").is_authentication());
        assert!(!AgentError::model("timeout").is_authentication());
        assert!(!AgentError::schema("missing field").is_authentication());
        assert!(!AgentError::automation("tab closed").is_authentication());
    }
}
