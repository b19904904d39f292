//! Vig-free fair odds from anchor books.
//!
//! For each side of a two-sided market the major book paying the most is
//! that side's anchor. The anchor's own two-sided line is de-vigged and the
//! side's fair probability is read off it:
//!
//! ```text
//! pinnacle:  Celtics -150 (0.6000)   Heat +130 (0.4348)   sum 1.0348
//! fair:      Celtics 0.5798 (-138)   Heat 0.4202 (+138)
//! ```
//!
//! The two sides may be anchored on different books, in which case the
//! fair probabilities need not sum to exactly one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use evscan_core::odds::{implied_vig, probability_to_american, remove_vig_two_sided};
use evscan_core::types::{MarketOdds, PriceQuote};
use evscan_core::EngineConfig;

use crate::matcher::{format_point, is_proposition_market, BetIdentity, BetMatcher, MatchConfig};

// =============================================================================
// Types
// =============================================================================

/// Fair pricing for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairOutcome {
    pub outcome_name: String,
    /// Identity of the anchored bet.
    pub identity: BetIdentity,
    pub fair_american: i64,
    pub fair_probability: f64,
    /// Implied probability of the anchor quote (0 if there is none).
    pub raw_probability: f64,
    pub anchor_book: Option<String>,
    /// True if the probability was derived as the complement of the other side.
    pub derived: bool,
}

/// Fair pricing for a market, in outcome order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FairOddsResult {
    pub outcomes: Vec<FairOutcome>,
}

impl FairOddsResult {
    /// Returns the fair outcome for `outcome_name` (ignoring case).
    #[must_use]
    pub fn get(&self, outcome_name: &str) -> Option<&FairOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.outcome_name.eq_ignore_ascii_case(outcome_name))
    }

    /// Returns the fair outcome anchored on `identity`.
    #[must_use]
    pub fn get_by_identity(&self, identity: &BetIdentity) -> Option<&FairOutcome> {
        self.outcomes.iter().find(|o| &o.identity == identity)
    }

    /// Iterates outcomes.
    pub fn iter(&self) -> impl Iterator<Item = &FairOutcome> {
        self.outcomes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Sum of fair probabilities.
    #[must_use]
    pub fn probability_sum(&self) -> f64 {
        self.outcomes.iter().map(|o| o.fair_probability).sum()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for fair-odds synthesis.
#[derive(Debug, Clone)]
pub struct FairOddsConfig {
    /// Books eligible as anchors, in priority order.
    pub major_books: Vec<String>,
    /// Anchor vig above which divergent anchors are reported.
    pub vig_warning_threshold: f64,
}

impl Default for FairOddsConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default())
    }
}

impl FairOddsConfig {
    #[must_use]
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            major_books: config.major_books.clone(),
            vig_warning_threshold: config.vig_warning_threshold,
        }
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// One side's anchor quote and, if found, the same book's opposite leg.
struct AnchorLine<'a> {
    quote: &'a PriceQuote,
    opposite: Option<&'a PriceQuote>,
}

/// Anchor-book fair-odds calculator.
#[derive(Debug, Clone)]
pub struct FairOddsCalculator {
    config: FairOddsConfig,
    matcher: BetMatcher,
}

impl Default for FairOddsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl FairOddsCalculator {
    /// Creates a calculator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FairOddsConfig::default())
    }

    /// Creates a calculator with custom configuration.
    #[must_use]
    pub fn with_config(config: FairOddsConfig) -> Self {
        let matcher = BetMatcher::with_config(MatchConfig::new(config.major_books.clone()));
        Self { config, matcher }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FairOddsConfig {
        &self.config
    }

    /// Calculates fair odds for a two-outcome market.
    ///
    /// Returns `None` unless the market has exactly two distinct outcome
    /// names across all books and at least one side's major-book anchor
    /// also quotes the opposite side.
    #[must_use]
    pub fn calculate(&self, market_odds: &MarketOdds, market_key: &str) -> Option<FairOddsResult> {
        let names = distinct_outcome_names(market_odds);
        if names.len() != 2 {
            debug!(
                market = %market_key,
                outcomes = names.len(),
                "Fair odds need exactly two outcomes"
            );
            return None;
        }

        let majors = market_odds.filtered(|q| self.is_major(&q.source_book));
        let lines: Vec<Option<AnchorLine<'_>>> = [(0, 1), (1, 0)]
            .iter()
            .map(|&(this, other)| self.anchor_line(&names[this], &names[other], &majors, market_key))
            .collect();

        let devig = |line: &AnchorLine<'_>| {
            line.opposite.map(|opp| {
                remove_vig_two_sided(line.quote.implied_probability(), opp.implied_probability()).0
            })
        };
        let fair: Vec<Option<f64>> = lines.iter().map(|l| l.as_ref().and_then(devig)).collect();

        let (p0, d0, p1, d1) = match (fair[0], fair[1]) {
            (Some(a), Some(b)) => (a, false, b, false),
            (Some(a), None) => (a, false, 1.0 - a, true),
            (None, Some(b)) => (1.0 - b, true, b, false),
            (None, None) => {
                debug!(market = %market_key, "No anchor quotes both sides");
                return None;
            }
        };

        if let (Some(a), Some(b)) = (&lines[0], &lines[1]) {
            self.check_divergent_anchors(a, b, market_key);
        }

        let outcomes = [(0, p0, d0), (1, p1, d1)]
            .iter()
            .map(|&(i, probability, derived)| {
                let line = lines[i].as_ref();
                let identity = line.map_or_else(
                    || identity_for_name(&names[i], market_odds, market_key),
                    |l| BetIdentity::of(l.quote, market_key),
                );
                FairOutcome {
                    outcome_name: line.map_or_else(|| names[i].clone(), |l| l.quote.outcome_name.clone()),
                    identity,
                    fair_american: probability_to_american(probability),
                    fair_probability: probability,
                    raw_probability: line.map_or(0.0, |l| l.quote.implied_probability()),
                    anchor_book: line.map(|l| l.quote.source_book.clone()),
                    derived,
                }
            })
            .collect();

        Some(FairOddsResult { outcomes })
    }

    /// Calculates fair odds for a proposition market.
    ///
    /// Quotes are grouped by subject and point; every group whose outcome
    /// names are exactly over and under is priced independently. Results
    /// are looked up by identity.
    #[must_use]
    pub fn calculate_proposition(
        &self,
        market_odds: &MarketOdds,
        market_key: &str,
    ) -> Option<FairOddsResult> {
        let groups: BTreeSet<(String, String)> = market_odds.quotes().map(group_key).collect();

        let mut result = FairOddsResult::default();
        for key in &groups {
            let group = market_odds.filtered(|q| &group_key(q) == key);
            let names = distinct_outcome_names(&group);
            let is_over_under = names.len() == 2
                && names.iter().any(|n| n.eq_ignore_ascii_case("over"))
                && names.iter().any(|n| n.eq_ignore_ascii_case("under"));
            if !is_over_under {
                continue;
            }
            if let Some(fair) = self.calculate(&group, market_key) {
                result.outcomes.extend(fair.outcomes);
            }
        }

        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Dispatches on market type.
    #[must_use]
    pub fn calculate_market(
        &self,
        market_odds: &MarketOdds,
        market_key: &str,
    ) -> Option<FairOddsResult> {
        if is_proposition_market(market_key) {
            self.calculate_proposition(market_odds, market_key)
        } else {
            self.calculate(market_odds, market_key)
        }
    }

    fn is_major(&self, book: &str) -> bool {
        self.config.major_books.iter().any(|b| b == book)
    }

    fn anchor_line<'a>(
        &self,
        name: &str,
        opposite_name: &str,
        majors: &'a MarketOdds,
        market_key: &str,
    ) -> Option<AnchorLine<'a>> {
        let quote = self.matcher.find_best_odds(
            name,
            majors,
            market_key,
            Some(&self.config.major_books),
        )?;
        let book = majors.book(&quote.source_book)?;
        let opposite = find_opposite_leg(&book.quotes, quote, opposite_name, market_key);
        Some(AnchorLine { quote, opposite })
    }

    fn check_divergent_anchors(&self, a: &AnchorLine<'_>, b: &AnchorLine<'_>, market_key: &str) {
        if a.quote.source_book == b.quote.source_book {
            return;
        }
        let vig_of = |line: &AnchorLine<'_>| {
            line.opposite.map_or(0.0, |opp| {
                implied_vig(line.quote.implied_probability(), opp.implied_probability())
            })
        };
        let vig = vig_of(a).max(vig_of(b));
        if vig > self.config.vig_warning_threshold {
            warn!(
                market = %market_key,
                anchor_a = %a.quote.source_book,
                anchor_b = %b.quote.source_book,
                vig,
                "Divergent anchors with high vig"
            );
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Distinct outcome names ignoring case, first-seen spelling kept.
fn distinct_outcome_names(market_odds: &MarketOdds) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for quote in market_odds.quotes() {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(&quote.outcome_name)) {
            names.push(quote.outcome_name.clone());
        }
    }
    names
}

fn group_key(quote: &PriceQuote) -> (String, String) {
    (
        quote.description.as_deref().unwrap_or_default().to_lowercase(),
        format_point(quote.point),
    )
}

fn identity_for_name(name: &str, market_odds: &MarketOdds, market_key: &str) -> BetIdentity {
    market_odds
        .quotes()
        .find(|q| q.is_named(name))
        .map_or_else(
            || BetIdentity::of(&PriceQuote::new(name, 0.0, ""), market_key),
            |q| BetIdentity::of(q, market_key),
        )
}

/// The anchor book's quote for the other side of `anchor`.
///
/// Prefers the mirrored line (negated point for spreads, the same point
/// otherwise) and falls back to any quote of the opposite name.
fn find_opposite_leg<'a>(
    book_quotes: &'a [PriceQuote],
    anchor: &PriceQuote,
    opposite_name: &str,
    market_key: &str,
) -> Option<&'a PriceQuote> {
    let expected_point = match (market_key, anchor.point) {
        ("spreads", Some(p)) => Some(-p),
        (_, point) => point,
    };
    let same_subject = |q: &&PriceQuote| {
        q.description.as_deref().map(str::to_lowercase)
            == anchor.description.as_deref().map(str::to_lowercase)
    };
    let candidates: Vec<&PriceQuote> = book_quotes
        .iter()
        .filter(|q| q.is_named(opposite_name))
        .filter(same_subject)
        .collect();

    candidates
        .iter()
        .find(|q| format_point(q.point) == format_point(expected_point))
        .or_else(|| candidates.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use evscan_core::odds::american_to_decimal;

    fn quote(name: &str, american: i64, book: &str) -> PriceQuote {
        PriceQuote::new(name, american_to_decimal(american), book)
    }

    fn h2h(book: &str, celtics: i64, heat: i64) -> Vec<PriceQuote> {
        vec![quote("Celtics", celtics, book), quote("Heat", heat, book)]
    }

    // ==================== Two-Way Tests ====================

    #[test]
    fn test_single_anchor_devig() {
        let odds = MarketOdds::new("h2h")
            .with_book("pinnacle", h2h("pinnacle", -150, 130))
            .with_book("fanduel", h2h("fanduel", -150, 130));

        let result = FairOddsCalculator::new().calculate(&odds, "h2h").unwrap();
        let celtics = result.get("Celtics").unwrap();
        let heat = result.get("Heat").unwrap();

        assert!((celtics.fair_probability - 0.5797).abs() < 1e-3);
        assert!((heat.fair_probability - 0.4203).abs() < 1e-3);
        assert_eq!(celtics.fair_american, -138);
        assert_eq!(heat.fair_american, 138);
        assert_eq!(celtics.anchor_book.as_deref(), Some("pinnacle"));
        assert!((result.probability_sum() - 1.0).abs() < 1e-9);
        assert!((celtics.raw_probability - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_each_side_anchors_on_best_major_price() {
        let odds = MarketOdds::new("h2h")
            .with_book("pinnacle", h2h("pinnacle", -150, 130))
            .with_book("fanduel", h2h("fanduel", -140, 115));

        let result = FairOddsCalculator::new().calculate(&odds, "h2h").unwrap();
        assert_eq!(result.get("Celtics").unwrap().anchor_book.as_deref(), Some("fanduel"));
        assert_eq!(result.get("Heat").unwrap().anchor_book.as_deref(), Some("pinnacle"));
    }

    #[test]
    fn test_exchanges_never_anchor() {
        let odds = MarketOdds::new("h2h")
            .with_book("pinnacle", h2h("pinnacle", -150, 130))
            .with_book("novig", h2h("novig", -110, 150));

        let result = FairOddsCalculator::new().calculate(&odds, "h2h").unwrap();
        assert!(result
            .iter()
            .all(|o| o.anchor_book.as_deref() == Some("pinnacle")));
    }

    #[test]
    fn test_derives_missing_side_as_complement() {
        let odds = MarketOdds::new("h2h")
            .with_book("pinnacle", h2h("pinnacle", -150, 130))
            .with_book("fanduel", vec![quote("Celtics", -120, "fanduel")]);

        let result = FairOddsCalculator::new().calculate(&odds, "h2h").unwrap();
        let celtics = result.get("Celtics").unwrap();
        let heat = result.get("Heat").unwrap();

        assert!(celtics.derived);
        assert_eq!(celtics.anchor_book.as_deref(), Some("fanduel"));
        assert!(!heat.derived);
        assert!((celtics.fair_probability + heat.fair_probability - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_anchor_with_both_sides() {
        let odds = MarketOdds::new("h2h")
            .with_book("pinnacle", vec![quote("Celtics", -150, "pinnacle")])
            .with_book("fanduel", vec![quote("Heat", 130, "fanduel")]);

        assert!(FairOddsCalculator::new().calculate(&odds, "h2h").is_none());
    }

    #[test]
    fn test_three_outcomes_is_no_result() {
        let odds = MarketOdds::new("h2h").with_book(
            "pinnacle",
            vec![
                quote("Arsenal", 110, "pinnacle"),
                quote("Chelsea", 250, "pinnacle"),
                quote("Draw", 240, "pinnacle"),
            ],
        );
        assert!(FairOddsCalculator::new().calculate(&odds, "h2h").is_none());
    }

    #[test]
    fn test_third_outcome_at_non_major_is_no_result() {
        let odds = MarketOdds::new("h2h")
            .with_book("pinnacle", h2h("pinnacle", -150, 130))
            .with_book("fanduel", h2h("fanduel", -150, 130))
            .with_book(
                "novig",
                vec![
                    quote("Celtics", -140, "novig"),
                    quote("Heat", 160, "novig"),
                    quote("Draw", 900, "novig"),
                ],
            );
        assert!(FairOddsCalculator::new().calculate(&odds, "h2h").is_none());
    }

    #[test]
    fn test_one_outcome_is_no_result() {
        let odds = MarketOdds::new("h2h").with_book("pinnacle", vec![quote("Celtics", -150, "pinnacle")]);
        assert!(FairOddsCalculator::new().calculate(&odds, "h2h").is_none());
    }

    // ==================== Spread Tests ====================

    #[test]
    fn test_spread_opposite_leg_uses_negated_point() {
        let spreads = |book: &str| {
            vec![
                quote("Celtics", -110, book).with_point(-3.5),
                quote("Heat", -110, book).with_point(3.5),
                quote("Celtics", 120, book).with_point(-5.5),
                quote("Heat", -145, book).with_point(5.5),
            ]
        };
        let odds = MarketOdds::new("spreads")
            .with_book("pinnacle", spreads("pinnacle"))
            .with_book("draftkings", spreads("draftkings"));

        let result = FairOddsCalculator::new().calculate(&odds, "spreads").unwrap();
        let celtics = result.get("Celtics").unwrap();
        assert_eq!(celtics.identity.as_str(), "celtics|-3.5");
        assert!((celtics.fair_probability - 0.5).abs() < 1e-9);
    }

    // ==================== Proposition Tests ====================

    #[test]
    fn test_proposition_groups_by_subject_and_point() {
        let props = |book: &str| {
            vec![
                quote("Over", -120, book).with_description("Jayson Tatum").with_point(27.5),
                quote("Under", 100, book).with_description("Jayson Tatum").with_point(27.5),
                quote("Over", 105, book).with_description("Jaylen Brown").with_point(22.5),
                quote("Under", -125, book).with_description("Jaylen Brown").with_point(22.5),
                quote("Over", 150, book).with_description("Derrick White").with_point(15.5),
            ]
        };
        let odds = MarketOdds::new("player_points")
            .with_book("pinnacle", props("pinnacle"))
            .with_book("fanduel", props("fanduel"));

        let result = FairOddsCalculator::new()
            .calculate_market(&odds, "player_points")
            .unwrap();
        assert_eq!(result.len(), 4);

        let over = BetIdentity::of(
            &quote("Over", -120, "x").with_description("Jayson Tatum").with_point(27.5),
            "player_points",
        );
        let tatum_over = result.get_by_identity(&over).unwrap();
        assert!(tatum_over.fair_probability > 0.5);
    }

    #[test]
    fn test_proposition_without_pairs_is_no_result() {
        let odds = MarketOdds::new("player_points").with_book(
            "pinnacle",
            vec![quote("Over", -120, "pinnacle").with_description("Jayson Tatum").with_point(27.5)],
        );
        assert!(FairOddsCalculator::new()
            .calculate_proposition(&odds, "player_points")
            .is_none());
    }
}
