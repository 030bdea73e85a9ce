//! WebPilot CLI host.
//!
//! Wires settings, an executor and an event printer together. The model
//! backend here is the offline scripted client; real providers plug in
//! through the same `ModelClient` trait without touching the host.

pub mod demo;
pub mod settings;

pub use demo::{demo_clients, run_demo_task};
pub use settings::Settings;
