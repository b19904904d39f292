use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Default TOML configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

/// Environment variable prefix; nested keys are split on `__`
/// (e.g. `EVSCAN_ENGINE__EV_THRESHOLD=0.03`).
pub const ENV_PREFIX: &str = "EVSCAN_";

/// Fallback environment variable for the feed API key.
pub const API_KEY_ENV: &str = "ODDS_API_KEY";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or fail validation.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration by layering built-in defaults, the TOML file at
    /// `path` (if present), a sibling JSON file, and `EVSCAN_` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or fail validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let json_path = path.with_extension("json");

        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(&json_path));

        Self::finish(figment)
    }

    /// Loads configuration from a TOML string layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or fails validation.
    pub fn load_from_str(toml: &str) -> Result<AppConfig> {
        let figment =
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(toml));
        Self::finish(figment)
    }

    fn finish(figment: Figment) -> Result<AppConfig> {
        let mut config: AppConfig = figment.extract().context("failed to parse configuration")?;

        if config.feed.api_key.is_none() {
            config.feed.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty());
        }

        config.validate()?;
        Ok(config)
    }
}
