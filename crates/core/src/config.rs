use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// Default EV threshold for a "take" recommendation.
pub const DEFAULT_EV_THRESHOLD: f64 = 0.045;

/// Default net EV targeted by posted exchange prices.
pub const DEFAULT_TARGET_MARGIN: f64 = 0.045;

/// Default exchange commission on profit.
pub const DEFAULT_EXCHANGE_FEE: f64 = 0.02;

/// Default maximum quote age in seconds.
pub const DEFAULT_MAX_QUOTE_AGE_SECS: i64 = 3600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.engine.validate()?;
        self.feed.validate()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// A peer-to-peer exchange and its commission on profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub key: String,
    #[serde(default = "default_exchange_fee")]
    pub fee: f64,
}

impl ExchangeConfig {
    #[must_use]
    pub fn new(key: impl Into<String>, fee: f64) -> Self {
        Self {
            key: key.into(),
            fee,
        }
    }
}

/// Commission charged by `book`, if it is one of `exchanges`.
#[must_use]
pub fn exchange_fee(exchanges: &[ExchangeConfig], book: &str) -> Option<f64> {
    exchanges.iter().find(|e| e.key == book).map(|e| e.fee)
}

fn default_exchange_fee() -> f64 {
    DEFAULT_EXCHANGE_FEE
}

/// Pricing and gating parameters for the analysis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// EV at or above which an outcome is a "take".
    pub ev_threshold: f64,
    /// Net EV targeted by posted exchange prices.
    pub target_margin: f64,
    /// Sharp/major books in priority order. Used for fair odds and coverage.
    pub major_books: Vec<String>,
    /// Peer-to-peer exchanges in preference order (at most two).
    pub exchanges: Vec<ExchangeConfig>,
    /// Quotes older than this are stale.
    pub max_quote_age_secs: i64,
    /// Major books required to quote a market or outcome.
    pub min_major_books: usize,
    /// Anchor-line vig above which divergent anchors are logged.
    pub vig_warning_threshold: f64,
    /// Drop opportunities with a lower `ev_raw`.
    pub min_ev_raw: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ev_threshold: DEFAULT_EV_THRESHOLD,
            target_margin: DEFAULT_TARGET_MARGIN,
            major_books: vec![
                "pinnacle".to_string(),
                "fanduel".to_string(),
                "draftkings".to_string(),
            ],
            exchanges: vec![
                ExchangeConfig::new("novig", DEFAULT_EXCHANGE_FEE),
                ExchangeConfig::new("prophetx", DEFAULT_EXCHANGE_FEE),
            ],
            max_quote_age_secs: DEFAULT_MAX_QUOTE_AGE_SECS,
            min_major_books: 2,
            vig_warning_threshold: 0.10,
            min_ev_raw: None,
        }
    }
}

impl EngineConfig {
    /// Returns true if `book` is a configured major book.
    #[must_use]
    pub fn is_major_book(&self, book: &str) -> bool {
        self.major_books.iter().any(|b| b == book)
    }

    /// Commission charged by `book`, if it is an exchange.
    #[must_use]
    pub fn exchange_fee(&self, book: &str) -> Option<f64> {
        exchange_fee(&self.exchanges, book)
    }

    /// Maximum quote age as a chrono duration.
    #[must_use]
    pub fn max_quote_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_quote_age_secs)
    }

    /// Sets the EV threshold.
    #[must_use]
    pub fn with_ev_threshold(mut self, threshold: f64) -> Self {
        self.ev_threshold = threshold;
        self
    }

    /// Sets the target margin.
    #[must_use]
    pub fn with_target_margin(mut self, margin: f64) -> Self {
        self.target_margin = margin;
        self
    }

    /// Sets the major books.
    #[must_use]
    pub fn with_major_books(mut self, books: &[&str]) -> Self {
        self.major_books = books.iter().map(|b| (*b).to_string()).collect();
        self
    }

    /// Sets the exchanges.
    #[must_use]
    pub fn with_exchanges(mut self, exchanges: Vec<ExchangeConfig>) -> Self {
        self.exchanges = exchanges;
        self
    }

    /// Sets the maximum quote age.
    #[must_use]
    pub fn with_max_quote_age_secs(mut self, secs: i64) -> Self {
        self.max_quote_age_secs = secs;
        self
    }

    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.ev_threshold > 0.0 && self.ev_threshold < 1.0) {
            return Err(CoreError::config(format!(
                "ev_threshold must be in (0, 1), got {}",
                self.ev_threshold
            )));
        }
        if !(self.target_margin > 0.0 && self.target_margin < 1.0) {
            return Err(CoreError::config(format!(
                "target_margin must be in (0, 1), got {}",
                self.target_margin
            )));
        }
        if self.major_books.is_empty() {
            return Err(CoreError::config("major_books must not be empty"));
        }
        if self.exchanges.len() > 2 {
            return Err(CoreError::config(format!(
                "at most two exchanges are supported, got {}",
                self.exchanges.len()
            )));
        }
        for exchange in &self.exchanges {
            if !(0.0..1.0).contains(&exchange.fee) {
                return Err(CoreError::config(format!(
                    "fee for exchange {} must be in [0, 1), got {}",
                    exchange.key, exchange.fee
                )));
            }
            if self.is_major_book(&exchange.key) {
                return Err(CoreError::config(format!(
                    "{} cannot be both a major book and an exchange",
                    exchange.key
                )));
            }
        }
        if self.max_quote_age_secs <= 0 {
            return Err(CoreError::config("max_quote_age_secs must be positive"));
        }
        if self.min_major_books == 0 {
            return Err(CoreError::config("min_major_books must be at least 1"));
        }
        Ok(())
    }
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of the raw feed snapshot.
    pub raw_ttl_secs: u64,
    /// Lifetime of the processed opportunity list.
    pub processed_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            raw_ttl_secs: 300,
            processed_ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn raw_ttl(&self) -> Duration {
        Duration::from_secs(self.raw_ttl_secs)
    }

    #[must_use]
    pub fn processed_ttl(&self) -> Duration {
        Duration::from_secs(self.processed_ttl_secs)
    }
}

// =============================================================================
// Feed
// =============================================================================

/// Odds feed endpoint and query parameters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub sports: Vec<String>,
    pub regions: String,
    pub markets: Vec<String>,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.the-odds-api.com/v4".to_string(),
            api_key: None,
            sports: vec![
                "basketball_nba".to_string(),
                "americanfootball_nfl".to_string(),
                "icehockey_nhl".to_string(),
                "baseball_mlb".to_string(),
            ],
            regions: "us,us_ex,eu".to_string(),
            markets: vec!["h2h".to_string(), "spreads".to_string(), "totals".to_string()],
            timeout_secs: 10,
            requests_per_minute: 30,
        }
    }
}

impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("sports", &self.sports)
            .field("regions", &self.regions)
            .field("markets", &self.markets)
            .field("timeout_secs", &self.timeout_secs)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl FeedConfig {
    /// Validates ranges.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` for a zero timeout or rate limit.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.timeout_secs == 0 {
            return Err(CoreError::config("feed.timeout_secs must be positive"));
        }
        if self.requests_per_minute == 0 {
            return Err(CoreError::config("feed.requests_per_minute must be positive"));
        }
        Ok(())
    }
}
