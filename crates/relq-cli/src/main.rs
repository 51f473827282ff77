use anyhow::{Context, Result};
use clap::Parser;
use relq_query::{QueryCompiler, QueryConfig, ShapedQuery};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

mod cli;
mod output;
mod params;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let env_filter = format!("relq={},relq_query={}", log_level, log_level);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .init();

    // Load configuration with CLI overrides
    let mut config = match &cli.config {
        Some(path) => QueryConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => QueryConfig::default(),
    };
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if cli.relational_nulls {
        config.use_relational_nulls = true;
    }
    debug!(?config, "Using configuration");

    let shape: ShapedQuery = read_json(&cli.query)?;
    let raw = match &cli.params {
        Some(path) => read_json(path)?,
        None => serde_json::Map::new(),
    };
    let values = params::bind(&shape, raw)?;

    let compiler = QueryCompiler::from_config(&config).context("Failed to set up query compiler")?;
    let command = compiler
        .compile(&shape, &values)
        .with_context(|| format!("Failed to compile {}", cli.query.display()))?;

    print!("{}", output::render(&command, cli.format)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}
