//! Conversation log supplied to the reasoning roles.
//!
//! The history always starts with the system message defining agent
//! behaviour. Later entries accumulate per step and are evicted oldest-first
//! (never the system message) once the configured bound is exceeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation message exchanged with a reasoning role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Behaviour-defining instructions, always the first entry.
    System,
    /// Human operator input or orchestrator-built state descriptions.
    User,
    /// Model output folded back into context.
    Assistant,
}

/// A single conversational message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: MessageRole,
    pub text: String,
    /// Base64 screenshot attached when vision is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image_base64: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Attach a screenshot to the message.
    pub fn with_image(mut self, image_base64: impl Into<String>) -> Self {
        self.image_base64 = Some(image_base64.into());
        self
    }

    /// Copy of this message with any image content removed.
    pub fn text_only(&self) -> Self {
        Self {
            role: self.role,
            text: self.text.clone(),
            image_base64: None,
            timestamp: self.timestamp,
        }
    }
}

/// Ordered, bounded conversation log owned by the executor.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    messages: Vec<AgentMessage>,
    max_messages: usize,
}

impl MessageHistory {
    pub const DEFAULT_MAX_MESSAGES: usize = 64;

    /// Create a history seeded with the behaviour-defining system message.
    pub fn new(system_text: impl Into<String>) -> Self {
        Self::with_max_messages(system_text, Self::DEFAULT_MAX_MESSAGES)
    }

    pub fn with_max_messages(system_text: impl Into<String>, max_messages: usize) -> Self {
        Self {
            messages: vec![AgentMessage::system(system_text)],
            max_messages: max_messages.max(2),
        }
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        // The system message is never evicted, so a history is never empty.
        self.messages.is_empty()
    }

    /// Append a message, evicting the oldest non-system entries while the
    /// configured bound is exceeded.
    pub fn push(&mut self, message: AgentMessage) {
        self.messages.push(message);
        while self.messages.len() > self.max_messages {
            self.messages.remove(1);
        }
    }

    /// Remove and return the newest message. The system message stays put.
    pub fn pop(&mut self) -> Option<AgentMessage> {
        if self.messages.len() > 1 {
            self.messages.pop()
        } else {
            None
        }
    }

    /// Full history with the leading system message swapped for another
    /// role's behaviour definition. Used by the Planner and Validator, which
    /// share the conversation but not the Navigator's instructions.
    pub fn for_role(&self, system_text: &str) -> Vec<AgentMessage> {
        let mut messages = self.messages.clone();
        messages[0] = AgentMessage::system(system_text);
        messages
    }

    /// Strip image content from the final message of a prepared view.
    /// Keeps planner token cost down when vision is enabled only for the
    /// acting role.
    pub fn strip_trailing_image(mut messages: Vec<AgentMessage>) -> Vec<AgentMessage> {
        if let Some(last) = messages.last_mut() {
            if last.image_base64.is_some() {
                *last = last.text_only();
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_starts_with_system_message() {
        let history = MessageHistory::new("be helpful");
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].role, MessageRole::System);
        assert_eq!(history.messages()[0].text, "be helpful");
    }

    #[test]
    fn test_eviction_spares_system_message() {
        let mut history = MessageHistory::with_max_messages("sys", 3);
        for n in 0..5 {
            history.push(AgentMessage::user(format!("turn {}", n)));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[0].role, MessageRole::System);
        // Oldest non-system entries went first.
        assert_eq!(history.messages()[1].text, "turn 3");
        assert_eq!(history.messages()[2].text, "turn 4");
    }

    #[test]
    fn test_pop_never_removes_system_message() {
        let mut history = MessageHistory::new("sys");
        assert!(history.pop().is_none());

        history.push(AgentMessage::user("hello"));
        assert_eq!(history.pop().unwrap().text, "hello");
        assert!(history.pop().is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_for_role_swaps_system_message() {
        let mut history = MessageHistory::new("navigator rules");
        history.push(AgentMessage::user("do the thing"));

        let view = history.for_role("planner rules");
        assert_eq!(view[0].text, "planner rules");
        assert_eq!(view[1].text, "do the thing");
        // The owned history is untouched.
        assert_eq!(history.messages()[0].text, "navigator rules");
    }

    #[test]
    fn test_strip_trailing_image() {
        let messages = vec![
            AgentMessage::system("sys"),
            AgentMessage::user("page state").with_image("aGVsbG8="),
        ];
        let stripped = MessageHistory::strip_trailing_image(messages);
        assert!(stripped[1].image_base64.is_none());
        assert_eq!(stripped[1].text, "page state");
    }
}
