//! Periodic refresh loop.

use anyhow::{bail, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use evscan_engine::{CacheManager, OddsApiClient, OddsSource, OpportunityReport, Pipeline};

use super::output::summary_line;

/// Arguments for the watch command.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Seconds between refreshes
    #[arg(long, default_value = "300")]
    pub interval_secs: u64,
}

/// Runs the watch loop until Ctrl+C.
///
/// # Errors
/// Returns an error if configuration is invalid or the feed client cannot
/// be built. Fetch failures inside the loop are logged and retried on the
/// next tick.
pub async fn run_watch(args: WatchArgs) -> Result<()> {
    if args.interval_secs == 0 {
        bail!("--interval-secs must be positive");
    }

    let config = super::load_config(&args.config)?;
    let client = OddsApiClient::new(config.feed.clone())?;
    let cache = Arc::new(CacheManager::new(&config.cache));
    let pipeline = Pipeline::new(client, config.engine, cache);

    info!(interval_secs = args.interval_secs, "Watching odds feed (Ctrl+C to stop)");

    let mut interval = tokio::time::interval(Duration::from_secs(args.interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = refresh(&pipeline).await;
                log_run(&report);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
        }
    }

    Ok(())
}

/// Drops the raw snapshot so each tick sees a new fetch, then recomputes.
async fn refresh<S: OddsSource>(pipeline: &Pipeline<S>) -> Arc<OpportunityReport> {
    pipeline.cache().invalidate_raw().await;
    pipeline.refresh().await
}

fn log_run(report: &OpportunityReport) {
    if let Some(error) = &report.error {
        warn!(error = %error, "Refresh failed");
        return;
    }

    info!("{}", summary_line(report));
    for opportunity in report.takes() {
        info!(
            event = %opportunity.event,
            bet = %opportunity.bet_description,
            best = %opportunity.best_available_odds,
            ev = %opportunity.expected_value,
            "Take"
        );
    }
}
