//! CLI commands for the +EV scanner.

pub mod analyze;
pub mod output;
pub mod scan;
pub mod watch;

pub use analyze::{run_analyze, AnalyzeArgs};
pub use scan::{run_scan, ScanArgs};
pub use watch::{run_watch, WatchArgs};

use anyhow::Result;
use evscan_core::{AppConfig, ConfigLoader};

/// Loads and validates configuration, logging the effective engine settings.
///
/// # Errors
/// Returns an error if the configuration cannot be parsed or is invalid.
pub fn load_config(path: &str) -> Result<AppConfig> {
    let config = ConfigLoader::load_from(path)?;
    tracing::info!(
        path = %path,
        ev_threshold = config.engine.ev_threshold,
        target_margin = config.engine.target_margin,
        major_books = ?config.engine.major_books,
        exchanges = config.engine.exchanges.len(),
        "Configuration loaded"
    );
    Ok(config)
}
