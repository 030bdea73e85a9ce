//! Consumed interface of the browser automation collaborator.
//!
//! The orchestrator treats page observation and action dispatch as opaque
//! external operations: it formats what it is given and forwards what the
//! Navigator decides, without interpreting either.

use async_trait::async_trait;
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AgentError;

/// One open browser tab, as reported by the automation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTab {
    pub id: i64,
    pub url: String,
    pub title: String,
}

/// Page snapshot formatted for model consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageState {
    /// Current page URL.
    pub url: String,

    /// Page title, when the document reports one.
    pub title: Option<String>,

    /// Indexed interactive elements in tree format.
    /// Example: "[0]<button>Submit</button>\n[1]<input type=\"text\">"
    pub element_tree: String,

    /// Base64-encoded screenshot (present when vision was requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_base64: Option<String>,

    /// Pixels of content above the viewport.
    pub pixels_above: i64,

    /// Pixels of content below the viewport.
    pub pixels_below: i64,

    /// Identifier of the tab the state was captured from.
    pub tab_id: i64,

    /// Other open tabs.
    #[serde(default)]
    pub tabs: Vec<OpenTab>,
}

/// A single browser action decided by the Navigator.
///
/// Opaque to the orchestrator: the name and parameters are interpreted only
/// by the automation collaborator that executes them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActionDirective {
    /// Action name, e.g. "click" or "navigate".
    #[serde(rename = "action")]
    pub name: String,

    /// Action parameters, forwarded verbatim.
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}

impl ActionDirective {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Outcome of dispatching one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Content the action extracted from the page, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,

    /// Error text when the action itself failed on the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            extracted_content: Some(content.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            extracted_content: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Browser automation session held by one executor for one task.
///
/// Action-level failures (the page rejected the interaction) are reported
/// through [`ActionOutcome::error`] and folded into the next step's context;
/// an `Err` from either method means the session itself broke and counts as
/// a step failure.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// Capture the current page state. Screenshot capture is skipped when
    /// `include_screenshot` is false.
    async fn page_state(&self, include_screenshot: bool) -> Result<PageState, AgentError>;

    /// Execute a single action directive.
    async fn dispatch(&self, action: &ActionDirective) -> Result<ActionOutcome, AgentError>;

    /// Release the underlying browser resources.
    async fn close(&self) -> Result<(), AgentError>;
}

/// Deterministic in-memory session used for tests and offline development.
#[derive(Debug)]
pub struct MockAutomationSession {
    state: Mutex<PageState>,
    dispatched: Mutex<Vec<ActionDirective>>,
    dispatch_error: Mutex<Option<String>>,
    closed: Mutex<bool>,
}

impl MockAutomationSession {
    pub fn new() -> Self {
        Self::with_page(PageState {
            url: "https://example.com".to_string(),
            title: Some("Example Domain".to_string()),
            element_tree: "[0]<a href=\"/more\">More information</a>".to_string(),
            screenshot_base64: None,
            pixels_above: 0,
            pixels_below: 0,
            tab_id: 1,
            tabs: Vec::new(),
        })
    }

    pub fn with_page(state: PageState) -> Self {
        Self {
            state: Mutex::new(state),
            dispatched: Mutex::new(Vec::new()),
            dispatch_error: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }

    /// Replace the page state returned by subsequent observations.
    pub fn set_page(&self, state: PageState) {
        *self.state.lock() = state;
    }

    /// Make every subsequent dispatch return an action-level error.
    pub fn fail_actions_with(&self, error: impl Into<String>) {
        *self.dispatch_error.lock() = Some(error.into());
    }

    /// Actions dispatched so far, in order.
    pub fn dispatched(&self) -> Vec<ActionDirective> {
        self.dispatched.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

impl Default for MockAutomationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationSession for MockAutomationSession {
    async fn page_state(&self, include_screenshot: bool) -> Result<PageState, AgentError> {
        let mut state = self.state.lock().clone();
        if !include_screenshot {
            state.screenshot_base64 = None;
        }
        Ok(state)
    }

    async fn dispatch(&self, action: &ActionDirective) -> Result<ActionOutcome, AgentError> {
        self.dispatched.lock().push(action.clone());
        if let Some(error) = self.dispatch_error.lock().clone() {
            return Ok(ActionOutcome::failure(error));
        }
        Ok(ActionOutcome::ok(format!("executed {}", action.name)))
    }

    async fn close(&self) -> Result<(), AgentError> {
        *self.closed.lock() = true;
        Ok(())
    }
}
