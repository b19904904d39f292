//! Shared building blocks for the +EV scanner.
//!
//! - [`odds`]: odds-format conversions, vig removal, EV and maker pricing
//! - [`types`]: feed wire types and the normalized market data model
//! - [`config`] / [`config_loader`]: layered configuration (defaults, TOML, env)
//! - [`error`]: shared error type

pub mod config;
pub mod config_loader;
pub mod error;
pub mod odds;
pub mod types;

pub use config::{AppConfig, CacheConfig, EngineConfig, ExchangeConfig, FeedConfig};
pub use config_loader::ConfigLoader;
pub use error::CoreError;
pub use odds::MakerOdds;
pub use types::{
    BookQuotes, BookmakerOdds, Event, FeedSnapshot, Market, MarketOdds, PriceQuote, RawBookmaker,
    RawEvent, RawFeed, RawMarket, RawOutcome,
};
