//! CLI entry point for replica placement.

use anyhow::Context;
use clap::Parser;
use cli::CliConfig;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(config.env_filter(rust_log.as_deref()))
        .init();

    let result = config.run()?;
    let output = serde_json::to_string_pretty(&result).context("serializing result")?;
    println!("{}", output);
    Ok(())
}
