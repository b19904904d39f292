//! Canonical bet identity and cross-book matching.
//!
//! Books format the same bet differently (`"Over"` vs `"over"`, `-3.5` vs
//! `-3.50`). Every quote is reduced to a [`BetIdentity`] so the rest of the
//! engine can ask "who else offers this exact bet?" without caring about
//! feed formatting.
//!
//! ```text
//! standard market:     side|point            e.g. "boston celtics|-3.5"
//! proposition market:  subject|market|point|side
//!                      e.g. "jayson tatum|player_points|27.5|over"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use evscan_core::types::{MarketOdds, PriceQuote};

// =============================================================================
// Constants
// =============================================================================

/// Market-key prefixes that mark proposition markets.
pub const PROPOSITION_PREFIXES: [&str; 3] = ["player_", "batter_", "pitcher_"];

/// Placeholder for a missing point or subject in an identity.
const NONE_TOKEN: &str = "none";

/// Returns true if the market key belongs to a proposition namespace.
#[must_use]
pub fn is_proposition_market(market_key: &str) -> bool {
    PROPOSITION_PREFIXES
        .iter()
        .any(|prefix| market_key.starts_with(prefix))
}

/// Renders a line so that `7`, `7.0` and `7.00` all read `"7"`.
#[must_use]
pub fn format_point(point: Option<f64>) -> String {
    match point {
        None => NONE_TOKEN.to_string(),
        // -0.0 would otherwise render as "-0"
        Some(p) if p == 0.0 => "0".to_string(),
        Some(p) => format!("{p}"),
    }
}

// =============================================================================
// Bet Identity
// =============================================================================

/// Canonical, lower-cased identity of a bet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BetIdentity(String);

impl BetIdentity {
    /// Builds the identity of a quote within a market.
    #[must_use]
    pub fn of(quote: &PriceQuote, market_key: &str) -> Self {
        let side = quote.outcome_name.to_lowercase();
        let point = format_point(quote.point);

        if is_proposition_market(market_key) {
            let subject = quote
                .description
                .as_deref()
                .map_or_else(|| NONE_TOKEN.to_string(), str::to_lowercase);
            Self(format!(
                "{subject}|{}|{point}|{side}",
                market_key.to_lowercase()
            ))
        } else {
            Self(format!("{side}|{point}"))
        }
    }

    /// Returns the identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the canonical identity string of a quote.
#[must_use]
pub fn identify(quote: &PriceQuote, market_key: &str) -> BetIdentity {
    BetIdentity::of(quote, market_key)
}

/// Finds the quote in one book's list matching `identity`.
#[must_use]
pub fn find_quote_in_book<'a>(
    quotes: &'a [PriceQuote],
    identity: &BetIdentity,
    market_key: &str,
) -> Option<&'a PriceQuote> {
    quotes
        .iter()
        .find(|q| &BetIdentity::of(q, market_key) == identity)
}

// =============================================================================
// Match Configuration
// =============================================================================

/// Configuration for bet matching.
#[derive(Debug, Clone, Default)]
pub struct MatchConfig {
    /// Major books counted for coverage.
    pub major_books: Vec<String>,
}

impl MatchConfig {
    /// Creates a configuration with the given major books.
    #[must_use]
    pub fn new(major_books: Vec<String>) -> Self {
        Self { major_books }
    }
}

// =============================================================================
// Bet Matcher
// =============================================================================

/// Matches equivalent bets across bookmakers and counts coverage.
#[derive(Debug, Clone, Default)]
pub struct BetMatcher {
    config: MatchConfig,
}

impl BetMatcher {
    /// Creates a matcher with no major books.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a matcher with custom configuration.
    #[must_use]
    pub fn with_config(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    fn is_major(&self, book: &str) -> bool {
        self.config.major_books.iter().any(|b| b == book)
    }

    /// Finds the best price for the bet first quoted under `outcome_name`.
    ///
    /// The target identity is taken from the first quote (in feed order)
    /// whose outcome name matches. See [`find_best_for_identity`](Self::find_best_for_identity)
    /// for the scan order and tie-break.
    #[must_use]
    pub fn find_best_odds<'a>(
        &self,
        outcome_name: &str,
        market_odds: &'a MarketOdds,
        market_key: &str,
        book_priority: Option<&[String]>,
    ) -> Option<&'a PriceQuote> {
        let target = market_odds.quotes().find(|q| q.is_named(outcome_name))?;
        let identity = BetIdentity::of(target, market_key);
        self.find_best_for_identity(&identity, market_odds, market_key, book_priority)
    }

    /// Finds the strictly greatest decimal price for `identity` across books.
    ///
    /// With `book_priority`, books are visited in that order (books not
    /// listed follow in feed order) and the first-seen maximum wins, so
    /// ties go to the earlier-listed book. Without it, the first-seen
    /// maximum in feed order wins.
    #[must_use]
    pub fn find_best_for_identity<'a>(
        &self,
        identity: &BetIdentity,
        market_odds: &'a MarketOdds,
        market_key: &str,
        book_priority: Option<&[String]>,
    ) -> Option<&'a PriceQuote> {
        let mut best: Option<&PriceQuote> = None;

        for book in ordered_books(market_odds, book_priority) {
            let Some(quote) = find_quote_in_book(&book.quotes, identity, market_key) else {
                continue;
            };
            match best {
                Some(current) if quote.decimal_price <= current.decimal_price => {}
                _ => best = Some(quote),
            }
        }

        best
    }

    /// Number of major books offering the same bet as `outcome`.
    #[must_use]
    pub fn count_major_books(
        &self,
        outcome: &PriceQuote,
        market_odds: &MarketOdds,
        market_key: &str,
    ) -> usize {
        self.count_major_books_for_identity(
            &BetIdentity::of(outcome, market_key),
            market_odds,
            market_key,
        )
    }

    /// Number of major books offering `identity`.
    #[must_use]
    pub fn count_major_books_for_identity(
        &self,
        identity: &BetIdentity,
        market_odds: &MarketOdds,
        market_key: &str,
    ) -> usize {
        market_odds
            .books
            .iter()
            .filter(|b| self.is_major(&b.book))
            .filter(|b| find_quote_in_book(&b.quotes, identity, market_key).is_some())
            .map(|b| b.book.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of major books quoting both sides of the market.
    ///
    /// Proposition markets: a book counts if, for at least one
    /// subject+point, it quotes both "over" and "under". Standard markets:
    /// a book counts if it quotes at least two distinct outcome names.
    #[must_use]
    pub fn count_major_books_with_both_sides(
        &self,
        market_odds: &MarketOdds,
        market_key: &str,
    ) -> usize {
        let proposition = is_proposition_market(market_key);

        market_odds
            .books
            .iter()
            .filter(|b| self.is_major(&b.book))
            .filter(|b| {
                if proposition {
                    has_over_under_pair(&b.quotes)
                } else {
                    distinct_outcome_names(&b.quotes) >= 2
                }
            })
            .map(|b| b.book.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Books in priority order followed by the rest in feed order.
fn ordered_books<'a>(
    market_odds: &'a MarketOdds,
    book_priority: Option<&[String]>,
) -> Vec<&'a evscan_core::types::BookQuotes> {
    let Some(priority) = book_priority else {
        return market_odds.books.iter().collect();
    };

    let mut ordered: Vec<_> = priority
        .iter()
        .filter_map(|key| market_odds.book(key))
        .collect();
    ordered.extend(
        market_odds
            .books
            .iter()
            .filter(|b| !priority.iter().any(|p| p == &b.book)),
    );
    ordered
}

fn distinct_outcome_names(quotes: &[PriceQuote]) -> usize {
    quotes
        .iter()
        .map(|q| q.outcome_name.to_lowercase())
        .collect::<HashSet<_>>()
        .len()
}

/// Returns true if some subject+point has both an "over" and an "under".
#[must_use]
pub fn has_over_under_pair(quotes: &[PriceQuote]) -> bool {
    let mut sides: HashMap<(String, String), (bool, bool)> = HashMap::new();

    for quote in quotes {
        let subject = quote
            .description
            .as_deref()
            .unwrap_or(NONE_TOKEN)
            .to_lowercase();
        let entry = sides
            .entry((subject, format_point(quote.point)))
            .or_insert((false, false));
        if quote.is_named("over") {
            entry.0 = true;
        } else if quote.is_named("under") {
            entry.1 = true;
        }
    }

    sides.values().any(|(over, under)| *over && *under)
}
