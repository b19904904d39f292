//! Market data model.
//!
//! Two layers live here:
//!
//! - **Wire types** (`Raw*`) mirror the odds feed JSON exactly and are only
//!   used for deserialization.
//! - **Domain types** ([`Event`], [`BookmakerOdds`], [`Market`],
//!   [`PriceQuote`]) are produced from the wire types by [`Event::from_raw`],
//!   which drops malformed quotes at the boundary so the calculators never
//!   see a price `<= 1.0`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::CoreError;

// =============================================================================
// Wire Types
// =============================================================================

/// Feed payload: sport key to events.
pub type RawFeed = BTreeMap<String, Vec<RawEvent>>;

/// One event as returned by the odds feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    #[serde(default)]
    pub sport_key: Option<String>,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    #[serde(default)]
    pub commence_time: Option<String>,
    #[serde(default)]
    pub bookmakers: Vec<RawBookmaker>,
}

/// A bookmaker's markets for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBookmaker {
    pub key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub markets: Vec<RawMarket>,
}

/// A single market (h2h, spreads, player_points, ...) at one bookmaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMarket {
    pub key: String,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<RawOutcome>,
}

/// A priced outcome. `price` is decimal odds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOutcome {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub point: Option<f64>,
    pub price: f64,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Parses a feed payload (sport key to event list) from JSON.
///
/// # Errors
///
/// Returns `CoreError::Parse` if the JSON does not match the feed shape.
pub fn parse_raw_feed(json: &str) -> Result<RawFeed, CoreError> {
    serde_json::from_str(json).map_err(|e| CoreError::Parse(e.to_string()))
}

/// Parses an RFC 3339 timestamp, returning `None` on failure.
#[must_use]
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    })
}

// =============================================================================
// Domain Types
// =============================================================================

/// A single bookmaker price for one outcome. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Outcome name ("Boston Celtics", "Over", ...).
    pub outcome_name: String,
    /// Subject of a proposition quote (usually a player name).
    pub description: Option<String>,
    /// Line (spread, total, or prop threshold).
    pub point: Option<f64>,
    /// Decimal price, always `> 1.0` after ingestion.
    pub decimal_price: f64,
    /// Bookmaker key that quoted this price.
    pub source_book: String,
    /// When the bookmaker last updated the quote.
    pub last_update: Option<DateTime<Utc>>,
}

impl PriceQuote {
    /// Creates a quote without subject, line or timestamp.
    #[must_use]
    pub fn new(
        outcome_name: impl Into<String>,
        decimal_price: f64,
        source_book: impl Into<String>,
    ) -> Self {
        Self {
            outcome_name: outcome_name.into(),
            description: None,
            point: None,
            decimal_price,
            source_book: source_book.into(),
            last_update: None,
        }
    }

    /// Sets the line.
    #[must_use]
    pub fn with_point(mut self, point: f64) -> Self {
        self.point = Some(point);
        self
    }

    /// Sets the proposition subject.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the last-update timestamp.
    #[must_use]
    pub fn with_last_update(mut self, last_update: DateTime<Utc>) -> Self {
        self.last_update = Some(last_update);
        self
    }

    /// Returns true if the price is a usable decimal price.
    #[must_use]
    pub fn has_valid_price(&self) -> bool {
        self.decimal_price.is_finite() && self.decimal_price > 1.0
    }

    /// Implied probability of the quoted price.
    #[must_use]
    pub fn implied_probability(&self) -> f64 {
        crate::odds::decimal_to_probability(self.decimal_price)
    }

    /// Returns true if the outcome name equals `name`, ignoring ASCII case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.outcome_name.eq_ignore_ascii_case(name)
    }
}

/// One market at one bookmaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub key: String,
    pub last_update: Option<DateTime<Utc>>,
    pub outcomes: Vec<PriceQuote>,
}

/// A bookmaker's markets for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerOdds {
    pub key: String,
    pub title: Option<String>,
    pub markets: Vec<Market>,
}

impl BookmakerOdds {
    /// Returns this book's market with the given key.
    #[must_use]
    pub fn market(&self, key: &str) -> Option<&Market> {
        self.markets.iter().find(|m| m.key == key)
    }
}

/// A sporting event with prices from every bookmaker that quotes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub sport_key: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: Option<DateTime<Utc>>,
    pub bookmakers: Vec<BookmakerOdds>,
}

impl Event {
    /// Builds a domain event from the wire shape, normalizing quotes.
    ///
    /// Outcomes with a non-finite or `<= 1.0` price are dropped, markets
    /// left without outcomes are dropped, and an outcome without its own
    /// timestamp inherits the market's, then the bookmaker's.
    #[must_use]
    pub fn from_raw(sport_key: &str, raw: RawEvent) -> Self {
        let sport_key = raw.sport_key.unwrap_or_else(|| sport_key.to_string());
        let mut bookmakers = Vec::with_capacity(raw.bookmakers.len());

        for book in raw.bookmakers {
            let book_update = parse_timestamp(book.last_update.as_deref());
            let mut markets = Vec::with_capacity(book.markets.len());

            for market in book.markets {
                let market_update = parse_timestamp(market.last_update.as_deref()).or(book_update);
                let outcomes: Vec<PriceQuote> = market
                    .outcomes
                    .into_iter()
                    .filter_map(|outcome| {
                        let quote = PriceQuote {
                            outcome_name: outcome.name,
                            description: outcome.description,
                            point: outcome.point,
                            decimal_price: outcome.price,
                            source_book: book.key.clone(),
                            last_update: parse_timestamp(outcome.last_update.as_deref())
                                .or(market_update),
                        };
                        if quote.has_valid_price() {
                            Some(quote)
                        } else {
                            debug!(
                                event_id = %raw.id,
                                book = %book.key,
                                market = %market.key,
                                outcome = %quote.outcome_name,
                                price = quote.decimal_price,
                                "Dropping quote with invalid price"
                            );
                            None
                        }
                    })
                    .collect();

                if outcomes.is_empty() {
                    continue;
                }
                markets.push(Market {
                    key: market.key,
                    last_update: market_update,
                    outcomes,
                });
            }

            if !markets.is_empty() {
                bookmakers.push(BookmakerOdds {
                    key: book.key,
                    title: book.title,
                    markets,
                });
            }
        }

        Self {
            id: raw.id,
            sport_key,
            home_team: raw.home_team,
            away_team: raw.away_team,
            commence_time: parse_timestamp(raw.commence_time.as_deref()),
            bookmakers,
        }
    }

    /// Display name, `"{away} @ {home}"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.away_team.is_empty(), self.home_team.is_empty()) {
            (false, false) => format!("{} @ {}", self.away_team, self.home_team),
            (true, false) => self.home_team.clone(),
            (false, true) => self.away_team.clone(),
            (true, true) => self.id.clone(),
        }
    }

    /// Distinct market keys across all books, in first-seen order.
    #[must_use]
    pub fn market_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for book in &self.bookmakers {
            for market in &book.markets {
                if !keys.contains(&market.key) {
                    keys.push(market.key.clone());
                }
            }
        }
        keys
    }

    /// Collects every book's quotes for one market key.
    #[must_use]
    pub fn market_odds(&self, market_key: &str) -> MarketOdds {
        let mut odds = MarketOdds::new(market_key);
        for book in &self.bookmakers {
            if let Some(market) = book.market(market_key) {
                odds.push(book.key.clone(), market.outcomes.clone());
            }
        }
        odds
    }

    /// Keeps only the markets whose key satisfies `keep`, dropping books
    /// left empty.
    pub fn retain_markets<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        for book in &mut self.bookmakers {
            book.markets.retain(|m| keep(&m.key));
        }
        self.bookmakers.retain(|b| !b.markets.is_empty());
    }
}

/// One book's quotes for a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookQuotes {
    pub book: String,
    pub quotes: Vec<PriceQuote>,
}

/// Every book's quotes for one market key of one event, in feed order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketOdds {
    pub market_key: String,
    pub books: Vec<BookQuotes>,
}

impl MarketOdds {
    /// Creates an empty collection for a market key.
    #[must_use]
    pub fn new(market_key: impl Into<String>) -> Self {
        Self {
            market_key: market_key.into(),
            books: Vec::new(),
        }
    }

    /// Appends a book's quotes.
    pub fn push(&mut self, book: impl Into<String>, quotes: Vec<PriceQuote>) {
        self.books.push(BookQuotes {
            book: book.into(),
            quotes,
        });
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with_book(mut self, book: impl Into<String>, quotes: Vec<PriceQuote>) -> Self {
        self.push(book, quotes);
        self
    }

    /// Returns a book's quotes.
    #[must_use]
    pub fn book(&self, key: &str) -> Option<&BookQuotes> {
        self.books.iter().find(|b| b.book == key)
    }

    /// Iterates all quotes across books in feed order.
    pub fn quotes(&self) -> impl Iterator<Item = &PriceQuote> {
        self.books.iter().flat_map(|b| b.quotes.iter())
    }

    /// Distinct outcome names in first-seen order.
    #[must_use]
    pub fn outcome_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for quote in self.quotes() {
            if !names.iter().any(|n| n == &quote.outcome_name) {
                names.push(quote.outcome_name.clone());
            }
        }
        names
    }

    /// Returns a copy keeping only quotes accepted by `keep`.
    #[must_use]
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&PriceQuote) -> bool,
    {
        let books = self
            .books
            .iter()
            .map(|b| BookQuotes {
                book: b.book.clone(),
                quotes: b.quotes.iter().filter(|q| keep(q)).cloned().collect(),
            })
            .filter(|b| !b.quotes.is_empty())
            .collect();
        Self {
            market_key: self.market_key.clone(),
            books,
        }
    }

    /// Returns true if no book quotes this market.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.iter().all(|b| b.quotes.is_empty())
    }
}

// =============================================================================
// Feed Snapshot
// =============================================================================

/// Normalized result of one fetch cycle.
///
/// `errors` carries fetch-level failures; a snapshot with errors and no
/// events is the error-tagged envelope downstream stages turn into an
/// empty result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub sports: BTreeMap<String, Vec<Event>>,
    pub fetched_at: DateTime<Utc>,
    pub errors: Vec<String>,
}

impl FeedSnapshot {
    /// Normalizes a raw feed.
    #[must_use]
    pub fn from_raw(raw: RawFeed, fetched_at: DateTime<Utc>) -> Self {
        let sports = raw
            .into_iter()
            .map(|(sport, events)| {
                let events = events
                    .into_iter()
                    .map(|e| Event::from_raw(&sport, e))
                    .collect();
                (sport, events)
            })
            .collect();

        Self {
            sports,
            fetched_at,
            errors: Vec::new(),
        }
    }

    /// Creates an empty snapshot tagged with a fetch error.
    #[must_use]
    pub fn failed(error: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            sports: BTreeMap::new(),
            fetched_at,
            errors: vec![error.into()],
        }
    }

    /// Returns true if the fetch failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Total number of events across sports.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.sports.values().map(Vec::len).sum()
    }

    /// Iterates all events across sports.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.sports.values().flat_map(|events| events.iter())
    }

    /// Most recent quote timestamp in the snapshot.
    #[must_use]
    pub fn latest_update(&self) -> Option<DateTime<Utc>> {
        self.events()
            .flat_map(|e| e.bookmakers.iter())
            .flat_map(|b| b.markets.iter())
            .flat_map(|m| m.outcomes.iter())
            .filter_map(|q| q.last_update)
            .max()
    }
}
