//! Consumed interface of the language-model collaborator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::AgentError;
use crate::messages::AgentMessage;

/// Abstraction over model backends so each reasoning role can be bound to an
/// independently configured client.
///
/// Implementations map provider credential rejections to
/// [`AgentError::Authentication`] and everything else to
/// [`AgentError::Model`]; the distinction drives the executor's retry policy.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the conversation and return the raw completion text.
    async fn invoke(&self, messages: &[AgentMessage]) -> Result<String, AgentError>;
}

/// One canned reply for the scripted client.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return this text as the completion.
    Text(String),
    /// Fail the call as a credential rejection.
    AuthFailure(String),
    /// Fail the call as a transport error.
    TransportFailure(String),
}

impl ScriptedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Deterministic client replaying canned responses in order.
///
/// Used by tests and the offline demo mode. When the script runs out, the
/// last response is replayed so open-ended loops stay deterministic.
pub struct ScriptedModelClient {
    script: Mutex<VecDeque<ScriptedResponse>>,
    last: Mutex<Option<ScriptedResponse>>,
    invocations: AtomicUsize,
}

impl ScriptedModelClient {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            last: Mutex::new(None),
            invocations: AtomicUsize::new(0),
        }
    }

    /// Client that answers every call with the same text.
    pub fn repeating(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedResponse::text(text)])
    }

    /// Number of invocations served so far.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<ScriptedResponse, AgentError> {
        let mut script = self.script.lock();
        if let Some(response) = script.pop_front() {
            *self.last.lock() = Some(response.clone());
            return Ok(response);
        }
        self.last
            .lock()
            .clone()
            .ok_or_else(|| AgentError::model("scripted client has no responses"))
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn invoke(&self, messages: &[AgentMessage]) -> Result<String, AgentError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(message_count = messages.len(), "scripted invocation");
        match self.next_response()? {
            ScriptedResponse::Text(text) => Ok(text),
            ScriptedResponse::AuthFailure(reason) => Err(AgentError::authentication(reason)),
            ScriptedResponse::TransportFailure(reason) => Err(AgentError::model(reason)),
        }
    }
}
