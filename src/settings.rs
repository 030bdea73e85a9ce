//! Settings loading: TOML file plus `WEBPILOT__*` environment overrides.

use std::path::PathBuf;

use serde::Deserialize;

use agent_core::ExecutionOptions;

/// Host-level settings, read-only to the orchestration core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Step ceiling per run.
    pub max_steps: u32,
    /// Consecutive-failure ceiling per run.
    pub max_failures: u32,
    /// Upper bound on the Navigator's action batch.
    pub max_actions_per_step: usize,
    /// Capture screenshots for the acting role.
    pub use_vision: bool,
    /// Also feed screenshots to the Planner.
    pub use_vision_for_planner: bool,
    /// Planner re-invocation cadence, in steps.
    pub planning_interval: u32,
    /// Message-history bound before eviction.
    pub max_history_messages: usize,
    /// Default tracing filter when RUST_LOG is not set.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let options = ExecutionOptions::default();
        Self {
            max_steps: options.max_steps,
            max_failures: options.max_failures,
            max_actions_per_step: options.max_actions_per_step,
            use_vision: options.use_vision,
            use_vision_for_planner: options.use_vision_for_planner,
            planning_interval: options.planning_interval,
            max_history_messages: options.max_history_messages,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, then apply `WEBPILOT__*`
    /// environment overrides (double underscore for nested keys).
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(ref path) = config_path {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WEBPILOT")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Knobs handed to the executor at construction.
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            max_steps: self.max_steps,
            max_failures: self.max_failures,
            max_actions_per_step: self.max_actions_per_step,
            use_vision: self.use_vision,
            use_vision_for_planner: self.use_vision_for_planner,
            planning_interval: self.planning_interval,
            max_history_messages: self.max_history_messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_execution_options() {
        let settings = Settings::default();
        let options = settings.execution_options();
        assert_eq!(options.max_steps, ExecutionOptions::default().max_steps);
        assert_eq!(options.max_failures, ExecutionOptions::default().max_failures);
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "max_steps = 7\nplanning_interval = 2").unwrap();

        let settings = Settings::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(settings.max_steps, 7);
        assert_eq!(settings.planning_interval, 2);
        // Untouched keys keep their defaults.
        assert_eq!(settings.max_failures, Settings::default().max_failures);
    }

    #[test]
    fn test_load_with_missing_file_uses_defaults() {
        let settings = Settings::load(Some(PathBuf::from("/nonexistent/webpilot.toml"))).unwrap();
        assert_eq!(settings.max_steps, Settings::default().max_steps);
    }
}
