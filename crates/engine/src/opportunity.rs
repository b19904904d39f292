//! Opportunity records and their display strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use evscan_core::odds::{apply_exchange_fee, decimal_to_american, format_american};
use evscan_core::types::{MarketOdds, PriceQuote};
use evscan_core::EngineConfig;

use crate::analyzer::EvClass;
use crate::matcher::{find_quote_in_book, format_point, is_proposition_market, BetIdentity, PROPOSITION_PREFIXES};

// =============================================================================
// Opportunity
// =============================================================================

/// One qualifying outcome, ready for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub event_id: String,
    pub sport_key: String,
    pub commence_time: Option<DateTime<Utc>>,
    #[serde(rename = "Event")]
    pub event: String,
    #[serde(rename = "Market")]
    pub market_key: String,
    #[serde(rename = "Outcome")]
    pub outcome_name: String,
    #[serde(rename = "Bet Description")]
    pub bet_description: String,
    #[serde(rename = "All Available Odds")]
    pub all_available_odds: String,
    #[serde(rename = "Fair Odds")]
    pub fair_odds: String,
    #[serde(rename = "Best Available Odds")]
    pub best_available_odds: String,
    #[serde(rename = "Expected Value %")]
    pub expected_value: String,
    #[serde(rename = "EV_Raw")]
    pub ev_raw: f64,
    #[serde(rename = "Proposed Posting Odds")]
    pub proposed_posting_odds: String,
    #[serde(rename = "Recommended Action")]
    pub recommended_action: String,
    pub classification: EvClass,
}

impl Opportunity {
    /// De-duplication key: event, market and bet description.
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.event_id.clone(),
            self.market_key.clone(),
            self.bet_description.clone(),
        )
    }
}

/// Sorts by `ev_raw` descending and keeps the best record per
/// [`dedup_key`](Opportunity::dedup_key).
///
/// Returns the kept records and the number removed.
#[must_use]
pub fn sort_and_dedup(mut opportunities: Vec<Opportunity>) -> (Vec<Opportunity>, usize) {
    opportunities.sort_by(|a, b| b.ev_raw.partial_cmp(&a.ev_raw).unwrap_or(Ordering::Equal));

    let before = opportunities.len();
    let mut seen = HashSet::new();
    opportunities.retain(|o| seen.insert(o.dedup_key()));
    let removed = before - opportunities.len();

    (opportunities, removed)
}

// =============================================================================
// Report
// =============================================================================

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub events_seen: usize,
    pub markets_seen: usize,
    pub markets_validated: usize,
    pub markets_analyzed: usize,
    pub markets_failed: usize,
    pub outcomes_emitted: usize,
    pub duplicates_removed: usize,
}

/// Processed result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityReport {
    pub opportunities: Vec<Opportunity>,
    pub generated_at: DateTime<Utc>,
    /// Set when the fetch failed; the list is then empty.
    pub error: Option<String>,
    pub stats: PipelineStats,
}

impl OpportunityReport {
    /// Creates an empty report tagged with an error.
    #[must_use]
    pub fn failed(error: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            opportunities: Vec::new(),
            generated_at,
            error: Some(error.into()),
            stats: PipelineStats::default(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Opportunities classified as `take`.
    pub fn takes(&self) -> impl Iterator<Item = &Opportunity> {
        self.opportunities
            .iter()
            .filter(|o| o.classification == EvClass::Take)
    }
}

// =============================================================================
// Display Formatting
// =============================================================================

/// Market label of a proposition key: namespace removed, `_` as spaces.
#[must_use]
pub fn market_label(market_key: &str) -> String {
    let stripped = PROPOSITION_PREFIXES
        .iter()
        .find_map(|prefix| market_key.strip_prefix(prefix))
        .unwrap_or(market_key);
    stripped.replace('_', " ")
}

fn signed_point(point: f64) -> String {
    if point > 0.0 {
        format!("+{}", format_point(Some(point)))
    } else {
        format_point(Some(point))
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human description of a bet.
#[must_use]
pub fn bet_description(quote: &PriceQuote, market_key: &str) -> String {
    if is_proposition_market(market_key) {
        let subject = quote.description.as_deref().unwrap_or("Unknown");
        return match quote.point {
            Some(p) => format!(
                "{subject} {} {} ({})",
                capitalize(&quote.outcome_name),
                format_point(Some(p)),
                market_label(market_key)
            ),
            None => format!(
                "{subject} {} ({})",
                capitalize(&quote.outcome_name),
                market_label(market_key)
            ),
        };
    }

    match (market_key, quote.point) {
        ("h2h", _) | (_, None) => quote.outcome_name.clone(),
        ("spreads", Some(p)) => format!("{} {}", quote.outcome_name, signed_point(p)),
        ("totals", Some(p)) => format!("{} {}", capitalize(&quote.outcome_name), format_point(Some(p))),
        (_, Some(p)) => format!("{} {}", quote.outcome_name, format_point(Some(p))),
    }
}

/// `"book: american"` for each book quoting `identity`, in feed order.
/// Exchange entries also show the fee-adjusted price.
#[must_use]
pub fn all_available_odds(
    identity: &BetIdentity,
    market_odds: &MarketOdds,
    market_key: &str,
    config: &EngineConfig,
) -> String {
    market_odds
        .books
        .iter()
        .filter_map(|book| {
            let quote = find_quote_in_book(&book.quotes, identity, market_key)?;
            let american = format_american(decimal_to_american(quote.decimal_price));
            Some(match config.exchange_fee(&book.book) {
                Some(fee) => {
                    let adjusted = apply_exchange_fee(quote.decimal_price, fee);
                    format!(
                        "{}: {american}\u{2192}{}",
                        book.book,
                        format_american(decimal_to_american(adjusted))
                    )
                }
                None => format!("{}: {american}", book.book),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn fee_percent(fee: f64) -> String {
    format!("{}", (fee * 10_000.0).round() / 100.0)
}

/// Best price with a fee annotation for exchanges.
#[must_use]
pub fn best_available_odds(quote: &PriceQuote, fee: Option<f64>) -> String {
    let american = format_american(decimal_to_american(quote.decimal_price));
    match fee {
        Some(fee) => {
            let adjusted = apply_exchange_fee(quote.decimal_price, fee);
            format!(
                "{}: {american} ({} after {}% fee)",
                quote.source_book,
                format_american(decimal_to_american(adjusted)),
                fee_percent(fee)
            )
        }
        None => format!("{}: {american}", quote.source_book),
    }
}

/// EV percentage, with the pre-fee figure for exchanges.
#[must_use]
pub fn expected_value_display(ev_net: f64, ev_gross: Option<f64>) -> String {
    match ev_gross {
        Some(gross) => format!("{:.2}% ({:.2}% pre-fee)", ev_net * 100.0, gross * 100.0),
        None => format!("{:.2}%", ev_net * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opportunity(event_id: &str, description: &str, ev_raw: f64) -> Opportunity {
        Opportunity {
            event_id: event_id.to_string(),
            sport_key: "basketball_nba".to_string(),
            commence_time: None,
            event: "Miami Heat @ Boston Celtics".to_string(),
            market_key: "h2h".to_string(),
            outcome_name: description.to_string(),
            bet_description: description.to_string(),
            all_available_odds: String::new(),
            fair_odds: "-138".to_string(),
            best_available_odds: String::new(),
            expected_value: expected_value_display(ev_raw, None),
            ev_raw,
            proposed_posting_odds: "N/A".to_string(),
            recommended_action: "No action".to_string(),
            classification: EvClass::Marginal,
        }
    }

    // ==================== Dedup Tests ====================

    #[test]
    fn test_dedup_keeps_highest_ev() {
        let (kept, removed) = sort_and_dedup(vec![
            opportunity("evt-1", "Boston Celtics", 0.03),
            opportunity("evt-1", "Boston Celtics", 0.07),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(removed, 1);
        assert!((kept[0].ev_raw - 0.07).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sorted_descending() {
        let (kept, removed) = sort_and_dedup(vec![
            opportunity("evt-1", "Boston Celtics", 0.01),
            opportunity("evt-2", "Miami Heat", 0.09),
            opportunity("evt-1", "Miami Heat", 0.05),
        ]);
        assert_eq!(removed, 0);
        let evs: Vec<f64> = kept.iter().map(|o| o.ev_raw).collect();
        assert_eq!(evs, vec![0.09, 0.05, 0.01]);
    }

    #[test]
    fn test_serializes_output_field_names() {
        let json = serde_json::to_value(opportunity("evt-1", "Boston Celtics", 0.05)).unwrap();
        assert_eq!(json["Event"], "Miami Heat @ Boston Celtics");
        assert_eq!(json["Bet Description"], "Boston Celtics");
        assert_eq!(json["Fair Odds"], "-138");
        assert_eq!(json["Expected Value %"], "5.00%");
        assert_eq!(json["classification"], "marginal");
        assert!(json.get("EV_Raw").is_some());
    }

    // ==================== Description Tests ====================

    #[test]
    fn test_bet_descriptions() {
        let h2h = PriceQuote::new("Boston Celtics", 1.6, "a");
        assert_eq!(bet_description(&h2h, "h2h"), "Boston Celtics");

        let spread = PriceQuote::new("Miami Heat", 1.9, "a").with_point(3.5);
        assert_eq!(bet_description(&spread, "spreads"), "Miami Heat +3.5");
        let spread = PriceQuote::new("Boston Celtics", 1.9, "a").with_point(-3.5);
        assert_eq!(bet_description(&spread, "spreads"), "Boston Celtics -3.5");

        let total = PriceQuote::new("over", 1.9, "a").with_point(221.0);
        assert_eq!(bet_description(&total, "totals"), "Over 221");

        let prop = PriceQuote::new("Under", 1.9, "a")
            .with_description("Jayson Tatum")
            .with_point(27.5);
        assert_eq!(
            bet_description(&prop, "player_points_rebounds"),
            "Jayson Tatum Under 27.5 (points rebounds)"
        );
    }

    #[test]
    fn test_market_label() {
        assert_eq!(market_label("batter_home_runs"), "home runs");
        assert_eq!(market_label("pitcher_strikeouts"), "strikeouts");
        assert_eq!(market_label("h2h"), "h2h");
    }

    // ==================== Odds Display Tests ====================

    #[test]
    fn test_all_available_odds() {
        let odds = MarketOdds::new("h2h")
            .with_book("pinnacle", vec![PriceQuote::new("Heat", 2.3, "pinnacle")])
            .with_book("fanduel", vec![PriceQuote::new("Celtics", 1.6, "fanduel")])
            .with_book("novig", vec![PriceQuote::new("Heat", 2.5, "novig")]);
        let identity = BetIdentity::of(&PriceQuote::new("Heat", 2.3, "x"), "h2h");

        let display = all_available_odds(&identity, &odds, "h2h", &EngineConfig::default());
        assert_eq!(display, "pinnacle: +130; novig: +150\u{2192}+147");
    }

    #[test]
    fn test_best_available_odds() {
        let quote = PriceQuote::new("Heat", 2.5, "novig");
        assert_eq!(
            best_available_odds(&quote, Some(0.02)),
            "novig: +150 (+147 after 2% fee)"
        );
        let quote = PriceQuote::new("Heat", 2.3, "pinnacle");
        assert_eq!(best_available_odds(&quote, None), "pinnacle: +130");
    }

    #[test]
    fn test_expected_value_display() {
        assert_eq!(expected_value_display(0.0789, Some(0.0924)), "7.89% (9.24% pre-fee)");
        assert_eq!(expected_value_display(-0.01, None), "-1.00%");
    }
}
