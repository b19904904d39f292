//! One-shot scan of the live odds feed.

use anyhow::{bail, Result};
use clap::Args;
use std::sync::Arc;

use evscan_engine::{CacheManager, OddsApiClient, Pipeline};

use super::output::{print_json, print_table};

/// Arguments for the scan command.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Show at most this many opportunities
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Runs the scan command.
///
/// # Errors
/// Returns an error if configuration is invalid, the feed client cannot be
/// built, or the fetch fails.
pub async fn run_scan(args: ScanArgs) -> Result<()> {
    let config = super::load_config(&args.config)?;

    let client = OddsApiClient::new(config.feed.clone())?;
    let cache = Arc::new(CacheManager::new(&config.cache));
    let pipeline = Pipeline::new(client, config.engine, cache);

    let report = pipeline.opportunities().await;
    if let Some(error) = &report.error {
        bail!("odds fetch failed: {error}");
    }

    if args.json {
        print_json(&report, args.limit)?;
    } else {
        print_table(&report, args.limit);
    }

    Ok(())
}
