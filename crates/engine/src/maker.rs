//! Exchange posting prices.
//!
//! When a bookmaker price is not worth taking, the engine proposes a price
//! to post on a peer-to-peer exchange that still clears the target margin
//! after commission, and picks which exchange to post on.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use evscan_core::odds::{american_to_probability, calculate_maker_odds, format_american, probability_to_decimal};
use evscan_core::types::MarketOdds;
use evscan_core::config::exchange_fee;
use evscan_core::{EngineConfig, ExchangeConfig, MakerOdds};

use crate::analyzer::EvClass;
use crate::matcher::{find_quote_in_book, BetIdentity};

// =============================================================================
// Types
// =============================================================================

/// Which side of the fair price the posted offer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingSide {
    /// Back the outcome: price from the fair probability.
    Back,
    /// Lay the outcome: price from the complement.
    Lay,
}

/// Why an exchange was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    /// No configured exchange quotes the bet.
    NoExistingMarkets,
    /// The other exchange already quotes the bet.
    NoCompetition,
    /// Current price is farther from fair than on the other exchange.
    LargerGap,
    /// Both exchanges are equally far from fair.
    TieDefault,
    /// Only one exchange is configured.
    SoleExchange,
}

impl fmt::Display for RecommendationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoExistingMarkets => "no existing markets",
            Self::NoCompetition => "no competition",
            Self::LargerGap => "larger gap from fair",
            Self::TieDefault => "tie, first listed",
            Self::SoleExchange => "only exchange",
        };
        f.write_str(text)
    }
}

/// Exchange chosen for posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecommendation {
    pub exchange: String,
    pub reason: RecommendationReason,
    /// Current decimal price of the bet on each configured exchange.
    pub current_prices: Vec<(String, Option<f64>)>,
}

/// Posting proposal for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakerProposal {
    pub recommendation: ExchangeRecommendation,
    pub fee: f64,
    pub odds: MakerOdds,
}

// =============================================================================
// Calculator
// =============================================================================

/// Configuration for maker pricing.
#[derive(Debug, Clone)]
pub struct MakerConfig {
    pub target_margin: f64,
    /// Exchanges in preference order.
    pub exchanges: Vec<ExchangeConfig>,
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default())
    }
}

impl MakerConfig {
    #[must_use]
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            target_margin: config.target_margin,
            exchanges: config.exchanges.clone(),
        }
    }
}

/// Computes posting prices and picks an exchange.
#[derive(Debug, Clone, Default)]
pub struct MakerOddsCalculator {
    config: MakerConfig,
}

impl MakerOddsCalculator {
    /// Creates a calculator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a calculator with custom configuration.
    #[must_use]
    pub fn with_config(config: MakerConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MakerConfig {
        &self.config
    }

    /// Posting price for a side of a fair American price.
    #[must_use]
    pub fn maker_odds(&self, fair_american: i64, side: PostingSide, fee: f64) -> MakerOdds {
        let fair = american_to_probability(fair_american);
        let probability = match side {
            PostingSide::Back => fair,
            PostingSide::Lay if fair > 0.0 => 1.0 - fair,
            PostingSide::Lay => 0.0,
        };
        calculate_maker_odds(probability, self.config.target_margin, fee)
    }

    /// Picks the exchange to post `identity` on.
    ///
    /// Returns `None` when no exchange is configured.
    #[must_use]
    pub fn recommend_exchange(
        &self,
        identity: &BetIdentity,
        market_odds: &MarketOdds,
        market_key: &str,
        fair_american: i64,
    ) -> Option<ExchangeRecommendation> {
        let current_prices: Vec<(String, Option<f64>)> = self
            .config
            .exchanges
            .iter()
            .map(|exchange| {
                let price = market_odds
                    .book(&exchange.key)
                    .and_then(|b| find_quote_in_book(&b.quotes, identity, market_key))
                    .map(|q| q.decimal_price);
                (exchange.key.clone(), price)
            })
            .collect();

        let (exchange, reason) = match current_prices.as_slice() {
            [] => return None,
            [(only, _)] => (only.clone(), RecommendationReason::SoleExchange),
            [(first, None), (_, None), ..] => (first.clone(), RecommendationReason::NoExistingMarkets),
            [(_, Some(_)), (second, None), ..] => (second.clone(), RecommendationReason::NoCompetition),
            [(first, None), (_, Some(_)), ..] => (first.clone(), RecommendationReason::NoCompetition),
            [(first, Some(a)), (second, Some(b)), ..] => {
                let fair_decimal = probability_to_decimal(american_to_probability(fair_american));
                let gap_a = (a - fair_decimal).abs();
                let gap_b = (b - fair_decimal).abs();
                if gap_a > gap_b {
                    (first.clone(), RecommendationReason::LargerGap)
                } else if gap_b > gap_a {
                    (second.clone(), RecommendationReason::LargerGap)
                } else {
                    (first.clone(), RecommendationReason::TieDefault)
                }
            }
        };

        debug!(
            identity = %identity,
            exchange = %exchange,
            reason = %reason,
            "Exchange selected"
        );

        Some(ExchangeRecommendation {
            exchange,
            reason,
            current_prices,
        })
    }

    /// Full posting proposal: exchange choice plus price at that exchange's fee.
    #[must_use]
    pub fn propose(
        &self,
        identity: &BetIdentity,
        market_odds: &MarketOdds,
        market_key: &str,
        fair_american: i64,
        side: PostingSide,
    ) -> Option<MakerProposal> {
        let recommendation = self.recommend_exchange(identity, market_odds, market_key, fair_american)?;
        let fee = exchange_fee(&self.config.exchanges, &recommendation.exchange).unwrap_or(0.0);

        Some(MakerProposal {
            odds: self.maker_odds(fair_american, side, fee),
            fee,
            recommendation,
        })
    }
}

/// Human-readable action for an analyzed outcome.
#[must_use]
pub fn recommended_action(
    classification: EvClass,
    best_book: Option<&str>,
    proposal: Option<&MakerProposal>,
) -> String {
    if let (EvClass::Take, Some(book)) = (classification, best_book) {
        return format!("Bet at {book}");
    }

    match proposal {
        Some(p) if p.odds.is_available() => format!(
            "Post at {} @ {} ({})",
            p.recommendation.exchange,
            format_american(p.odds.american_odds),
            p.recommendation.reason
        ),
        _ => "No action".to_string(),
    }
}
