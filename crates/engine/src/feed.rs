//! Odds feed sources.
//!
//! [`OddsSource`] is the seam between the pipeline and wherever prices come
//! from. [`OddsApiClient`] reads a The-Odds-API style REST endpoint;
//! [`StaticOddsSource`] serves a fixed snapshot for offline analysis.
//!
//! ```text
//! GET {base_url}/sports/{sport}/odds
//!     ?apiKey=...&regions=us,us_ex,eu&markets=h2h,spreads,totals
//!     &oddsFormat=decimal&dateFormat=iso
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use evscan_core::types::{parse_raw_feed, FeedSnapshot, RawEvent, RawFeed};
use evscan_core::FeedConfig;

use crate::error::{FeedError, Result};

// =============================================================================
// Source Trait
// =============================================================================

/// Produces a snapshot of current prices.
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Fetches every configured sport.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] if any request fails.
    async fn fetch(&self) -> Result<FeedSnapshot>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: OddsSource + ?Sized> OddsSource for Arc<S> {
    async fn fetch(&self) -> Result<FeedSnapshot> {
        (**self).fetch().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Rate-limited client for the odds REST API.
pub struct OddsApiClient {
    http: Client,
    config: FeedConfig,
    api_key: String,
    rate_limiter: Arc<DirectRateLimiter>,
}

impl std::fmt::Debug for OddsApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OddsApiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OddsApiClient {
    /// Creates a client from feed configuration.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Configuration` if no API key is set, or if the
    /// HTTP client cannot be built.
    pub fn new(config: FeedConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| FeedError::Configuration("feed API key is not set".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(nonzero!(30u32));
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            http,
            config,
            api_key,
            rate_limiter,
        })
    }

    /// Returns the feed configuration.
    #[must_use]
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Fetches the events of one sport.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] on transport failure, a non-success status,
    /// or an unparseable body.
    pub async fn fetch_sport(&self, sport: &str) -> Result<Vec<RawEvent>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/sports/{}/odds", self.config.base_url.trim_end_matches('/'), sport);
        let markets = self.config.markets.join(",");
        debug!(url = %url, regions = %self.config.regions, markets = %markets, "GET odds");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", self.config.regions.as_str()),
                ("markets", markets.as_str()),
                ("oddsFormat", "decimal"),
                ("dateFormat", "iso"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FeedError::api(status.as_u16(), text));
        }

        if let Some(remaining) = response
            .headers()
            .get("x-requests-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!(sport = %sport, remaining = %remaining, "Feed quota");
        }

        let body = response.text().await?;
        let events: Vec<RawEvent> = serde_json::from_str(&body)?;
        debug!(sport = %sport, events = events.len(), "Fetched sport");
        Ok(events)
    }
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn fetch(&self) -> Result<FeedSnapshot> {
        let mut raw = RawFeed::new();
        for sport in &self.config.sports {
            let events = self.fetch_sport(sport).await?;
            raw.insert(sport.clone(), events);
        }

        let snapshot = FeedSnapshot::from_raw(raw, Utc::now());
        info!(
            sports = snapshot.sports.len(),
            events = snapshot.event_count(),
            "Odds feed fetched"
        );
        Ok(snapshot)
    }

    fn name(&self) -> &str {
        "odds-api"
    }
}

// =============================================================================
// Static Source
// =============================================================================

/// Serves the same snapshot on every fetch.
#[derive(Debug, Clone)]
pub struct StaticOddsSource {
    snapshot: FeedSnapshot,
}

impl StaticOddsSource {
    #[must_use]
    pub fn new(snapshot: FeedSnapshot) -> Self {
        Self { snapshot }
    }

    /// Builds a source from feed JSON (sport key to events).
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Serialization` if the JSON does not match the feed shape.
    pub fn from_json(json: &str, fetched_at: DateTime<Utc>) -> Result<Self> {
        let raw = parse_raw_feed(json)?;
        Ok(Self::new(FeedSnapshot::from_raw(raw, fetched_at)))
    }

    /// Reads feed JSON from a file.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Configuration` if the file cannot be read, or
    /// `FeedError::Serialization` if it does not parse.
    pub fn from_file(path: impl AsRef<Path>, fetched_at: DateTime<Utc>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FeedError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json, fetched_at)
    }

    #[must_use]
    pub fn snapshot(&self) -> &FeedSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl OddsSource for StaticOddsSource {
    async fn fetch(&self) -> Result<FeedSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> FeedConfig {
        FeedConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-key".to_string()),
            sports: vec!["basketball_nba".to_string()],
            ..FeedConfig::default()
        }
    }

    fn nba_events() -> serde_json::Value {
        serde_json::json!([{
            "id": "evt-1",
            "sport_key": "basketball_nba",
            "home_team": "Boston Celtics",
            "away_team": "Miami Heat",
            "commence_time": "2026-01-10T00:30:00Z",
            "bookmakers": [{
                "key": "pinnacle",
                "title": "Pinnacle",
                "last_update": "2026-01-09T20:00:00Z",
                "markets": [{
                    "key": "h2h",
                    "outcomes": [
                        {"name": "Boston Celtics", "price": 1.67},
                        {"name": "Miami Heat", "price": 2.3}
                    ]
                }]
            }]
        }])
    }

    // ==================== Client Tests ====================

    #[test]
    fn test_new_requires_api_key() {
        let mut cfg = config("http://localhost");
        cfg.api_key = None;
        let err = OddsApiClient::new(cfg).unwrap_err();
        assert!(matches!(err, FeedError::Configuration(_)));
    }

    #[test]
    fn test_debug_does_not_leak_api_key() {
        let client = OddsApiClient::new(config("http://localhost")).unwrap();
        assert!(!format!("{client:?}").contains("test-key"));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sports/basketball_nba/odds"))
            .and(query_param("apiKey", "test-key"))
            .and(query_param("oddsFormat", "decimal"))
            .and(query_param("markets", "h2h,spreads,totals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(nba_events()))
            .mount(&mock_server)
            .await;

        let client = OddsApiClient::new(config(&mock_server.uri())).unwrap();
        let snapshot = client.fetch().await.unwrap();

        assert!(!snapshot.is_error());
        assert_eq!(snapshot.event_count(), 1);
        let event = &snapshot.sports["basketball_nba"][0];
        assert_eq!(event.display_name(), "Miami Heat @ Boston Celtics");
        assert_eq!(event.bookmakers[0].markets[0].outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sports/basketball_nba/odds"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&mock_server)
            .await;

        let client = OddsApiClient::new(config(&mock_server.uri())).unwrap();
        let err = client.fetch().await.unwrap_err();

        assert!(matches!(err, FeedError::Api { status_code: 401, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_bad_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sports/basketball_nba/odds"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"message\": 1}"))
            .mount(&mock_server)
            .await;

        let client = OddsApiClient::new(config(&mock_server.uri())).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, FeedError::Serialization(_)));
    }

    // ==================== Static Source Tests ====================

    #[tokio::test]
    async fn test_static_source() {
        let json = serde_json::json!({ "basketball_nba": nba_events() }).to_string();
        let source = StaticOddsSource::from_json(&json, Utc::now()).unwrap();

        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot.event_count(), 1);
        assert_eq!(source.name(), "static");
    }

    #[test]
    fn test_static_source_rejects_bad_json() {
        let err = StaticOddsSource::from_json("[1, 2]", Utc::now()).unwrap_err();
        assert!(matches!(err, FeedError::Serialization(_)));
    }
}
