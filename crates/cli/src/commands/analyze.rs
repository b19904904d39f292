//! Offline analysis of a saved feed snapshot.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use tracing::info;

use evscan_engine::{CacheManager, Pipeline, StaticOddsSource};

use super::output::{print_json, print_table};

/// Arguments for the analyze command.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Feed JSON file (sport key to list of events)
    #[arg(short, long)]
    pub input: String,

    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Show at most this many opportunities
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Judge quote freshness against the current time instead of the
    /// newest quote in the file
    #[arg(long)]
    pub wall_clock: bool,
}

/// Runs the analyze command.
///
/// # Errors
/// Returns an error if configuration is invalid or the input cannot be
/// read or parsed.
pub fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = super::load_config(&args.config)?;

    let source = StaticOddsSource::from_file(&args.input, Utc::now())
        .with_context(|| format!("failed to load feed from {}", args.input))?;

    // Saved feeds are old by the time they are analyzed, so freshness is
    // measured from the newest quote unless told otherwise.
    let now = if args.wall_clock {
        Utc::now()
    } else {
        source.snapshot().latest_update().unwrap_or_else(Utc::now)
    };
    info!(input = %args.input, events = source.snapshot().event_count(), reference = %now, "Analyzing saved feed");

    let pipeline = Pipeline::new(source, config.engine, Arc::new(CacheManager::new(&config.cache)));
    let report = pipeline.analyze_snapshot(pipeline.source().snapshot(), now);

    if args.json {
        print_json(&report, args.limit)?;
    } else {
        print_table(&report, args.limit);
    }

    Ok(())
}
