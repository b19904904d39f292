//! Market qualification gates.
//!
//! A market reaches the calculators only if enough major books quote it
//! in full with fresh prices and the market is structurally two-sided.
//! Failing markets are dropped with a debug line; rejections are never
//! surfaced to users.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

use evscan_core::types::{Event, MarketOdds, PriceQuote};
use evscan_core::EngineConfig;

use crate::matcher::{format_point, has_over_under_pair, is_proposition_market};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for market validation.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Books whose coverage counts toward the gate.
    pub major_books: Vec<String>,
    /// Quotes older than this are ignored.
    pub max_quote_age: Duration,
    /// Major books required to quote the market in full.
    pub min_major_books: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default())
    }
}

impl ValidatorConfig {
    /// Builds a validator configuration from the engine settings.
    #[must_use]
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            major_books: config.major_books.clone(),
            max_quote_age: config.max_quote_age(),
            min_major_books: config.min_major_books,
        }
    }
}

// =============================================================================
// Rejection
// =============================================================================

/// The gate a market failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No usable quotes at all.
    NoQuotes,
    /// Too few major books quote the market in full.
    InsufficientMajorBooks { found: usize, required: usize },
    /// The market does not resolve to two complementary outcomes.
    NotTwoSided { outcomes: usize },
    /// No subject has both an over and an under at a shared point.
    NoOverUnderPair,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoQuotes => write!(f, "no usable quotes"),
            Self::InsufficientMajorBooks { found, required } => {
                write!(f, "{found} major books quote the market, {required} required")
            }
            Self::NotTwoSided { outcomes } => {
                write!(f, "not two-sided ({outcomes} distinct outcomes)")
            }
            Self::NoOverUnderPair => write!(f, "no over/under pair at a shared point"),
        }
    }
}

// =============================================================================
// Market Validator
// =============================================================================

/// Applies the coverage, freshness and two-sidedness gates.
#[derive(Debug, Clone, Default)]
pub struct MarketValidator {
    config: ValidatorConfig,
}

impl MarketValidator {
    /// Creates a validator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator with custom configuration.
    #[must_use]
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Returns true if a quote is usable at `now`.
    ///
    /// A quote without a timestamp (missing or unparseable) is tolerated.
    #[must_use]
    pub fn is_fresh(&self, quote: &PriceQuote, now: DateTime<Utc>) -> bool {
        quote
            .last_update
            .map_or(true, |updated| now - updated <= self.config.max_quote_age)
    }

    /// Checks one market of an event.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] naming the first failing gate.
    pub fn validate_market(
        &self,
        event: &Event,
        market_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        let odds = self.usable_odds(event, market_key, now);
        self.validate_odds(&odds, market_key)
    }

    /// Checks a market whose quotes are already usable.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] naming the first failing gate.
    pub fn validate_odds(&self, odds: &MarketOdds, market_key: &str) -> Result<(), Rejection> {
        if odds.is_empty() {
            return Err(Rejection::NoQuotes);
        }

        if is_proposition_market(market_key) {
            if !has_over_under_pair(&odds.quotes().cloned().collect::<Vec<_>>()) {
                return Err(Rejection::NoOverUnderPair);
            }
        } else {
            let outcomes = distinct_names(odds.quotes());
            if outcomes != 2 {
                return Err(Rejection::NotTwoSided { outcomes });
            }
        }

        let found = odds
            .books
            .iter()
            .filter(|b| self.config.major_books.iter().any(|m| m == &b.book))
            .filter(|b| is_full_quote(&b.quotes, market_key))
            .map(|b| b.book.as_str())
            .collect::<HashSet<_>>()
            .len();

        if found < self.config.min_major_books {
            return Err(Rejection::InsufficientMajorBooks {
                found,
                required: self.config.min_major_books,
            });
        }

        Ok(())
    }

    /// Returns a copy of the event keeping only qualifying markets with
    /// their stale quotes removed, or `None` if nothing qualifies.
    #[must_use]
    pub fn filter_event(&self, event: &Event, now: DateTime<Utc>) -> Option<Event> {
        let mut filtered = event.clone();

        for book in &mut filtered.bookmakers {
            for market in &mut book.markets {
                market.outcomes.retain(|q| self.is_fresh(q, now));
            }
            book.markets.retain(|m| !m.outcomes.is_empty());
        }
        filtered.bookmakers.retain(|b| !b.markets.is_empty());

        let qualifying: HashSet<String> = filtered
            .market_keys()
            .into_iter()
            .filter(|key| match self.validate_odds(&filtered.market_odds(key), key) {
                Ok(()) => true,
                Err(rejection) => {
                    debug!(
                        event_id = %event.id,
                        market = %key,
                        reason = %rejection,
                        "Market rejected"
                    );
                    false
                }
            })
            .collect();

        filtered.retain_markets(|key| qualifying.contains(key));

        if filtered.bookmakers.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    /// Runs [`filter_event`](Self::filter_event) over a sport map,
    /// dropping events and sports left empty.
    #[must_use]
    pub fn filter_events(
        &self,
        sports: &BTreeMap<String, Vec<Event>>,
        now: DateTime<Utc>,
    ) -> BTreeMap<String, Vec<Event>> {
        sports
            .iter()
            .filter_map(|(sport, events)| {
                let kept: Vec<Event> = events
                    .iter()
                    .filter_map(|e| self.filter_event(e, now))
                    .collect();
                if kept.is_empty() {
                    None
                } else {
                    Some((sport.clone(), kept))
                }
            })
            .collect()
    }

    fn usable_odds(&self, event: &Event, market_key: &str, now: DateTime<Utc>) -> MarketOdds {
        event
            .market_odds(market_key)
            .filtered(|q| q.has_valid_price() && self.is_fresh(q, now))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn distinct_names<'a>(quotes: impl Iterator<Item = &'a PriceQuote>) -> usize {
    quotes
        .map(|q| q.outcome_name.to_lowercase())
        .collect::<HashSet<_>>()
        .len()
}

/// Returns true if one book's quotes cover both sides of the market.
fn is_full_quote(quotes: &[PriceQuote], market_key: &str) -> bool {
    if is_proposition_market(market_key) {
        return has_over_under_pair(quotes);
    }
    // Spreads and moneylines only need two distinct sides.
    if distinct_names(quotes.iter()) != 2 {
        return false;
    }

    match market_key {
        "totals" => {
            let overs: HashSet<String> = quotes
                .iter()
                .filter(|q| q.is_named("over"))
                .map(|q| format_point(q.point))
                .collect();
            quotes
                .iter()
                .filter(|q| q.is_named("under"))
                .any(|q| overs.contains(&format_point(q.point)))
        }
        _ => true,
    }
}
