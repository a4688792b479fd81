//! CLI configuration.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, CommandResult};
use crate::scenario::Scenario;

/// Store-aware replica placement over a recorded cluster scenario.
#[derive(Parser, Debug, Clone)]
#[command(name = "placement", version)]
pub struct CliConfig {
    /// JSON scenario: routing table, policy table, store responses, clock
    #[arg(long, value_name = "PATH")]
    pub scenario: PathBuf,

    /// Attach per-node decision records to every verdict
    #[arg(long)]
    pub explain: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Log filter: `rust_log` (the `RUST_LOG` value) when set and valid,
    /// otherwise `info`, or `debug` with `--verbose`.
    pub fn env_filter(&self, rust_log: Option<&str>) -> EnvFilter {
        let from_env = rust_log
            .filter(|directives| !directives.trim().is_empty())
            .and_then(|directives| EnvFilter::try_new(directives).ok());
        from_env.unwrap_or_else(|| {
            let level = if self.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
            EnvFilter::default().add_directive(level.into())
        })
    }

    /// Load the scenario and run the selected command against it.
    pub fn run(&self) -> anyhow::Result<CommandResult> {
        let scenario = Scenario::load(&self.scenario)?;
        self.command.execute(scenario, self.explain)
    }
}
