//! Per-outcome expected value and classification.
//!
//! Each fair-priced outcome is compared with the best price on offer for
//! the same bet. Exchange prices are classified on their fee-adjusted value
//! while the pre-fee EV is kept for display.

use serde::{Deserialize, Serialize};
use std::fmt;

use evscan_core::odds::{american_to_probability, apply_exchange_fee, calculate_ev_gross, calculate_ev_net};
use evscan_core::types::{MarketOdds, PriceQuote};
use evscan_core::config::exchange_fee;
use evscan_core::{EngineConfig, ExchangeConfig};

use crate::fair_odds::{FairOddsResult, FairOutcome};
use crate::matcher::{BetIdentity, BetMatcher, MatchConfig};

// =============================================================================
// Classification
// =============================================================================

/// EV category of an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvClass {
    /// EV at or above the threshold: bet the quoted price.
    Take,
    /// Positive EV below the threshold.
    Marginal,
    /// Zero or negative EV.
    NoEv,
    /// No market quote for the bet.
    NoData,
}

impl EvClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Take => "take",
            Self::Marginal => "marginal",
            Self::NoEv => "no_ev",
            Self::NoData => "no_data",
        }
    }
}

impl fmt::Display for EvClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Results
// =============================================================================

/// EV analysis of one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvResult {
    pub outcome_name: String,
    pub identity: BetIdentity,
    pub fair_american: i64,
    pub fair_probability: f64,
    /// Best quote for the bet across all books.
    pub best_quote: Option<PriceQuote>,
    pub is_exchange: bool,
    /// Commission applied to the best quote (zero for bookmakers).
    pub fee: f64,
    /// Decimal price used for classification (fee-adjusted on exchanges).
    pub effective_decimal: f64,
    /// EV after fees as a fraction of stake.
    pub ev_net: f64,
    /// EV before fees, only for exchange quotes.
    pub ev_gross: Option<f64>,
    pub classification: EvClass,
}

impl EvResult {
    /// Net EV in percent.
    #[must_use]
    pub fn ev_percentage_net(&self) -> f64 {
        self.ev_net * 100.0
    }

    /// Pre-fee EV in percent, for exchange quotes.
    #[must_use]
    pub fn ev_percentage_gross(&self) -> Option<f64> {
        self.ev_gross.map(|ev| ev * 100.0)
    }

    /// Returns true if there is a market quote.
    #[must_use]
    pub fn has_quote(&self) -> bool {
        self.best_quote.is_some()
    }
}

/// Outcome counts per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvSummary {
    pub take: usize,
    pub marginal: usize,
    pub no_ev: usize,
    pub no_data: usize,
}

impl EvSummary {
    /// Counts one outcome.
    pub fn record(&mut self, class: EvClass) {
        match class {
            EvClass::Take => self.take += 1,
            EvClass::Marginal => self.marginal += 1,
            EvClass::NoEv => self.no_ev += 1,
            EvClass::NoData => self.no_data += 1,
        }
    }

    /// Adds another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.take += other.take;
        self.marginal += other.marginal;
        self.no_ev += other.no_ev;
        self.no_data += other.no_data;
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.take + self.marginal + self.no_ev + self.no_data
    }
}

impl FromIterator<EvClass> for EvSummary {
    fn from_iter<I: IntoIterator<Item = EvClass>>(iter: I) -> Self {
        let mut summary = Self::default();
        for class in iter {
            summary.record(class);
        }
        summary
    }
}

/// EV analysis of every outcome in a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub market_key: String,
    pub results: Vec<EvResult>,
    pub summary: EvSummary,
}

// =============================================================================
// Analyzer
// =============================================================================

/// Configuration for EV analysis.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub ev_threshold: f64,
    pub exchanges: Vec<ExchangeConfig>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default())
    }
}

impl AnalyzerConfig {
    #[must_use]
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            ev_threshold: config.ev_threshold,
            exchanges: config.exchanges.clone(),
        }
    }
}

/// Computes and classifies EV for fair-priced outcomes.
#[derive(Debug, Clone, Default)]
pub struct EvAnalyzer {
    config: AnalyzerConfig,
    matcher: BetMatcher,
}

impl EvAnalyzer {
    /// Creates an analyzer with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an analyzer with custom configuration.
    #[must_use]
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            config,
            matcher: BetMatcher::with_config(MatchConfig::default()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Classifies an EV against the threshold.
    #[must_use]
    pub fn classify_ev(&self, ev: f64) -> EvClass {
        if ev >= self.config.ev_threshold {
            EvClass::Take
        } else if ev > 0.0 {
            EvClass::Marginal
        } else {
            EvClass::NoEv
        }
    }

    /// Analyzes one fair-priced outcome against the market.
    ///
    /// The best quote is looked up by the outcome's anchored identity and
    /// falls back to the first quote carrying the outcome's name.
    #[must_use]
    pub fn analyze_outcome(
        &self,
        fair: &FairOutcome,
        market_odds: &MarketOdds,
        market_key: &str,
    ) -> EvResult {
        let best = self
            .matcher
            .find_best_for_identity(&fair.identity, market_odds, market_key, None)
            .or_else(|| {
                self.matcher
                    .find_best_odds(&fair.outcome_name, market_odds, market_key, None)
            });

        // Recompute from the rounded American price that is displayed.
        let fair_probability = american_to_probability(fair.fair_american);

        let Some(quote) = best else {
            return EvResult {
                outcome_name: fair.outcome_name.clone(),
                identity: fair.identity.clone(),
                fair_american: fair.fair_american,
                fair_probability,
                best_quote: None,
                is_exchange: false,
                fee: 0.0,
                effective_decimal: 0.0,
                ev_net: 0.0,
                ev_gross: None,
                classification: EvClass::NoData,
            };
        };

        let charged = exchange_fee(&self.config.exchanges, &quote.source_book);
        let fee = charged.unwrap_or(0.0);
        let ev_net = calculate_ev_net(fair_probability, quote.decimal_price, fee);

        EvResult {
            outcome_name: quote.outcome_name.clone(),
            identity: BetIdentity::of(quote, market_key),
            fair_american: fair.fair_american,
            fair_probability,
            best_quote: Some(quote.clone()),
            is_exchange: charged.is_some(),
            fee,
            effective_decimal: apply_exchange_fee(quote.decimal_price, fee),
            ev_net,
            ev_gross: charged.map(|_| calculate_ev_gross(fair_probability, quote.decimal_price)),
            classification: self.classify_ev(ev_net),
        }
    }

    /// Analyzes every outcome of a fair-odds result.
    #[must_use]
    pub fn analyze_market(
        &self,
        fair: &FairOddsResult,
        market_odds: &MarketOdds,
        market_key: &str,
    ) -> MarketAnalysis {
        let results: Vec<EvResult> = fair
            .iter()
            .map(|outcome| self.analyze_outcome(outcome, market_odds, market_key))
            .collect();
        let summary = results.iter().map(|r| r.classification).collect();

        MarketAnalysis {
            market_key: market_key.to_string(),
            results,
            summary,
        }
    }
}
