//! Positive expected value detection for sports betting markets.
//!
//! Prices from many bookmakers are reduced to a vig-free fair price using
//! the sharpest available line for each side. Every quote is then compared
//! with that fair price:
//!
//! ```text
//! fair (pinnacle anchor):   Heat +138   (p = 0.4202)
//! betmgm:                   Heat +150   (d = 2.50)
//! EV = 0.4202 * 2.50 - 1  = +5.0%   -> take at betmgm
//!
//! fair:                     Celtics -138 (p = 0.5798)
//! best available:           Celtics -125 (d = 1.80)
//! EV = +4.4%                          -> post on an exchange instead
//! ```
//!
//! # Modules
//!
//! - [`matcher`]: canonical bet identity and cross-book matching
//! - [`validator`]: coverage, freshness and two-sidedness gates
//! - [`fair_odds`]: anchor-book vig removal
//! - [`analyzer`]: EV and classification
//! - [`maker`]: exchange posting prices and exchange choice
//! - [`opportunity`]: output records, display strings, de-duplication
//! - [`cache`]: TTL cache slots
//! - [`feed`]: odds sources
//! - [`pipeline`]: orchestration

pub mod analyzer;
pub mod cache;
pub mod error;
pub mod fair_odds;
pub mod feed;
pub mod maker;
pub mod matcher;
pub mod opportunity;
pub mod pipeline;
pub mod validator;

pub use analyzer::{EvAnalyzer, EvClass, EvResult, EvSummary, MarketAnalysis};
pub use cache::{CacheManager, CacheSlot};
pub use error::{EngineError, FeedError};
pub use fair_odds::{FairOddsCalculator, FairOddsResult, FairOutcome};
pub use feed::{OddsApiClient, OddsSource, StaticOddsSource};
pub use maker::{ExchangeRecommendation, MakerOddsCalculator, PostingSide, RecommendationReason};
pub use matcher::{identify, is_proposition_market, BetIdentity, BetMatcher};
pub use opportunity::{Opportunity, OpportunityReport, PipelineStats};
pub use pipeline::Pipeline;
pub use validator::{MarketValidator, Rejection, ValidatorConfig};
