//! Tally scenario simulator.
//!
//! Replays a JSON scenario against a ledger backed by an in-memory token and
//! a manual clock, then prints a JSON report of every step and the final
//! positions.

mod config;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::SimConfig;
use crate::scenario::{Scenario, Simulation};

#[derive(Parser, Debug)]
#[command(
    name = "tally-sim",
    version,
    about = "Replay staking scenarios against an in-memory Tally ledger"
)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Configuration file (TOML, JSON, or YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Exit non-zero if any step is rejected
    #[arg(long)]
    strict: bool,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    info!("Tally simulator v{}", env!("CARGO_PKG_VERSION"));
    let config = SimConfig::load(args.config.as_deref())?;
    let scenario = Scenario::from_file(&args.scenario)?;

    let mut sim = Simulation::new(&config)?;
    let report = sim.run(&scenario)?;

    let rendered = serde_json::to_string_pretty(&report).context("failed to render report")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{rendered}"),
    }

    if args.strict && report.failures > 0 {
        anyhow::bail!("{} step(s) rejected", report.failures);
    }
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Logs go to stderr so the report on stdout stays parseable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
