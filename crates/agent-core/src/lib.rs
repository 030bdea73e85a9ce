//! Core orchestration runtime for WebPilot.
//!
//! Sequences three reasoning roles (Planner, Navigator, Validator) into a
//! bounded, pausable step loop over shared conversation state, observable
//! through a single-subscriber event stream.

pub mod agents;
pub mod browser;
pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod messages;
pub mod model_client;
pub mod prompts;

pub use agents::{
    parse_structured, NavigationDecision, NavigatorAgent, PlannerAgent, PlannerDecision,
    ValidationVerdict, ValidatorAgent,
};
pub use browser::{
    ActionDirective, ActionOutcome, AutomationSession, MockAutomationSession, OpenTab, PageState,
};
pub use context::{ControlHandle, ExecutionContext, ExecutionOptions, StepInfo};
pub use errors::AgentError;
pub use events::{Actor, EventSink, ExecutionEvent, ExecutionState};
pub use executor::{ExecutionStatus, Executor, RoleClients};
pub use messages::{AgentMessage, MessageHistory, MessageRole};
pub use model_client::{ModelClient, ScriptedModelClient, ScriptedResponse};
