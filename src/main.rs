//! WebPilot command-line entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use agent_core::{prompts, ExecutionStatus, NavigationDecision, PlannerDecision, ValidationVerdict};
use webpilot_cli::{run_demo_task, Settings};

#[derive(Parser)]
#[command(name = "webpilot", version, about = "LLM-driven web task automation")]
struct Cli {
    /// Optional settings file (TOML). `WEBPILOT__*` env vars override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a task against the offline scripted backend.
    Run {
        /// The task objective.
        #[arg(long)]
        task: String,

        /// Follow-up objective appended once the first run finishes.
        #[arg(long)]
        follow_up: Option<String>,

        /// Override the configured step ceiling.
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Print a role's JSON output schema.
    Schema {
        #[arg(value_enum)]
        role: Role,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Planner,
    Navigator,
    Validator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.clone()).context("loading settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Run {
            task,
            follow_up,
            max_steps,
        } => {
            let mut options = settings.execution_options();
            if let Some(max_steps) = max_steps {
                options.max_steps = max_steps;
            }

            let status = run_demo_task(&task, follow_up.as_deref(), options).await?;
            match status {
                ExecutionStatus::Completed => Ok(()),
                other => anyhow::bail!("task ended in {:?}", other),
            }
        }
        Command::Schema { role } => {
            let schema = match role {
                Role::Planner => prompts::schema_block::<PlannerDecision>(),
                Role::Navigator => prompts::schema_block::<NavigationDecision>(),
                Role::Validator => prompts::schema_block::<ValidationVerdict>(),
            };
            println!("{schema}");
            Ok(())
        }
    }
}
