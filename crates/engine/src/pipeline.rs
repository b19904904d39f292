//! Fetch, validate, price, rank.
//!
//! One run turns a feed snapshot into a ranked, de-duplicated opportunity
//! list:
//!
//! ```text
//! fetch ─► validate ─► per market: fair odds ─► EV ─► maker ─► records
//!                                                              │
//!                                        sort by EV, de-dup ◄──┘
//! ```
//!
//! Results are kept in the processed cache slot; a failed fetch produces
//! an empty report tagged with the error.

use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

use evscan_core::odds::format_american;
use evscan_core::types::{Event, FeedSnapshot, MarketOdds};
use evscan_core::EngineConfig;

use crate::analyzer::{AnalyzerConfig, EvAnalyzer, EvClass, EvResult};
use crate::cache::CacheManager;
use crate::error::{EngineError, FeedError};
use crate::fair_odds::{FairOddsCalculator, FairOddsConfig, FairOddsResult};
use crate::feed::OddsSource;
use crate::maker::{recommended_action, MakerConfig, MakerOddsCalculator, PostingSide};
use crate::matcher::{BetMatcher, MatchConfig};
use crate::opportunity::{
    all_available_odds, best_available_odds, bet_description, expected_value_display,
    sort_and_dedup, Opportunity, OpportunityReport, PipelineStats,
};
use crate::validator::{MarketValidator, ValidatorConfig};

/// Orchestrates one source, the calculators and the cache.
pub struct Pipeline<S: OddsSource> {
    source: S,
    cache: Arc<CacheManager>,
    config: EngineConfig,
    validator: MarketValidator,
    matcher: BetMatcher,
    fair_odds: FairOddsCalculator,
    analyzer: EvAnalyzer,
    maker: MakerOddsCalculator,
}

impl<S: OddsSource> Pipeline<S> {
    /// Creates a pipeline over `source`, sharing `cache`.
    #[must_use]
    pub fn new(source: S, config: EngineConfig, cache: Arc<CacheManager>) -> Self {
        Self {
            validator: MarketValidator::with_config(ValidatorConfig::from_engine(&config)),
            matcher: BetMatcher::with_config(MatchConfig::new(config.major_books.clone())),
            fair_odds: FairOddsCalculator::with_config(FairOddsConfig::from_engine(&config)),
            analyzer: EvAnalyzer::with_config(AnalyzerConfig::from_engine(&config)),
            maker: MakerOddsCalculator::with_config(MakerConfig::from_engine(&config)),
            source,
            cache,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Cached feed snapshot, re-fetching if stale.
    ///
    /// # Errors
    ///
    /// Returns the source's [`FeedError`]; failures are not cached.
    pub async fn raw_snapshot(&self) -> Result<Arc<FeedSnapshot>, FeedError> {
        self.cache.get_or_refresh_raw(|| self.source.fetch()).await
    }

    /// Cached report, recomputing only if stale.
    pub async fn opportunities(&self) -> Arc<OpportunityReport> {
        let result = self
            .cache
            .get_or_refresh_processed(|| async { Ok::<_, Infallible>(self.compute().await) })
            .await;
        match result {
            Ok(report) => report,
            Err(never) => match never {},
        }
    }

    /// Recomputes the report regardless of its age.
    pub async fn refresh(&self) -> Arc<OpportunityReport> {
        let result = self
            .cache
            .force_refresh_processed(|| async { Ok::<_, Infallible>(self.compute().await) })
            .await;
        match result {
            Ok(report) => report,
            Err(never) => match never {},
        }
    }

    async fn compute(&self) -> OpportunityReport {
        let now = Utc::now();
        match self.raw_snapshot().await {
            Ok(snapshot) => self.analyze_snapshot(&snapshot, now),
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    error = %e,
                    transient = e.is_transient(),
                    "Odds fetch failed"
                );
                OpportunityReport::failed(e.to_string(), now)
            }
        }
    }

    /// Runs the analysis stages over a snapshot without touching the cache.
    ///
    /// `now` is the reference time for quote freshness.
    #[must_use]
    pub fn analyze_snapshot(&self, snapshot: &FeedSnapshot, now: DateTime<Utc>) -> OpportunityReport {
        if snapshot.is_error() {
            return OpportunityReport::failed(snapshot.errors.join("; "), now);
        }

        let mut stats = PipelineStats {
            events_seen: snapshot.event_count(),
            ..PipelineStats::default()
        };
        let mut opportunities = Vec::new();

        for event in snapshot.events() {
            stats.markets_seen += event.market_keys().len();

            let Some(event) = self.validator.filter_event(event, now) else {
                continue;
            };

            for market_key in event.market_keys() {
                stats.markets_validated += 1;
                match self.analyze_market(&event, &market_key) {
                    Ok(found) => {
                        stats.markets_analyzed += 1;
                        opportunities.extend(found);
                    }
                    Err(e) => {
                        warn!(event_id = %event.id, market = %market_key, error = %e, "Market analysis failed");
                        stats.markets_failed += 1;
                    }
                }
            }
        }

        if let Some(min_ev) = self.config.min_ev_raw {
            opportunities.retain(|o| o.ev_raw >= min_ev);
        }

        let (opportunities, removed) = sort_and_dedup(opportunities);
        stats.duplicates_removed = removed;
        stats.outcomes_emitted = opportunities.len();

        info!(
            events = stats.events_seen,
            markets_validated = stats.markets_validated,
            markets_failed = stats.markets_failed,
            opportunities = stats.outcomes_emitted,
            takes = opportunities.iter().filter(|o| o.classification == EvClass::Take).count(),
            "Pipeline run complete"
        );

        OpportunityReport {
            opportunities,
            generated_at: now,
            error: None,
            stats,
        }
    }

    /// Prices one market of `event`.
    ///
    /// Markets without fair odds or coverage yield no records.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidMarket` if the market fails validation,
    /// or `EngineError::Calculation` if fair pricing produced an unusable
    /// probability.
    pub fn analyze_market(&self, event: &Event, market_key: &str) -> Result<Vec<Opportunity>, EngineError> {
        let odds = event.market_odds(market_key);
        self.validator
            .validate_odds(&odds, market_key)
            .map_err(|rejection| EngineError::invalid_market(&event.id, market_key, rejection.to_string()))?;

        let both_sides = self.matcher.count_major_books_with_both_sides(&odds, market_key);
        if both_sides < self.config.min_major_books {
            debug!(event_id = %event.id, market = %market_key, both_sides, "Insufficient two-sided coverage");
            return Ok(Vec::new());
        }

        let Some(fair) = self.fair_odds.calculate_market(&odds, market_key) else {
            debug!(event_id = %event.id, market = %market_key, "No fair odds");
            return Ok(Vec::new());
        };
        check_fair(&fair)?;

        let analysis = self.analyzer.analyze_market(&fair, &odds, market_key);

        Ok(analysis
            .results
            .iter()
            .filter(|r| r.classification != EvClass::NoData)
            .filter(|r| {
                self.matcher
                    .count_major_books_for_identity(&r.identity, &odds, market_key)
                    >= self.config.min_major_books
            })
            .filter_map(|r| self.build_opportunity(event, market_key, &odds, r))
            .collect())
    }

    fn build_opportunity(
        &self,
        event: &Event,
        market_key: &str,
        odds: &MarketOdds,
        result: &EvResult,
    ) -> Option<Opportunity> {
        let quote = result.best_quote.as_ref()?;
        let proposal = self.maker.propose(
            &result.identity,
            odds,
            market_key,
            result.fair_american,
            PostingSide::Back,
        );

        Some(Opportunity {
            event_id: event.id.clone(),
            sport_key: event.sport_key.clone(),
            commence_time: event.commence_time,
            event: event.display_name(),
            market_key: market_key.to_string(),
            outcome_name: result.outcome_name.clone(),
            bet_description: bet_description(quote, market_key),
            all_available_odds: all_available_odds(&result.identity, odds, market_key, &self.config),
            fair_odds: format_american(result.fair_american),
            best_available_odds: best_available_odds(quote, result.is_exchange.then_some(result.fee)),
            expected_value: expected_value_display(result.ev_net, result.ev_gross),
            ev_raw: result.ev_net,
            proposed_posting_odds: proposal
                .as_ref()
                .map_or_else(|| "N/A".to_string(), |p| format_american(p.odds.american_odds)),
            recommended_action: recommended_action(
                result.classification,
                Some(quote.source_book.as_str()),
                proposal.as_ref(),
            ),
            classification: result.classification,
        })
    }
}

fn check_fair(fair: &FairOddsResult) -> Result<(), EngineError> {
    for outcome in fair.iter() {
        let p = outcome.fair_probability;
        if !p.is_finite() || p <= 0.0 || p >= 1.0 || outcome.fair_american == 0 {
            return Err(EngineError::Calculation(format!(
                "fair probability {p} for {} is out of range",
                outcome.identity
            )));
        }
    }
    Ok(())
}
