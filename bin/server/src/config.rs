//! Server configuration.
//!
//! Composed from the library configs and loaded via the `config` crate from
//! `SKYCAST_`-prefixed environment variables, with `__` separating nested
//! keys (for example `SKYCAST_WEATHER__API_KEY`).

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::Deserialize;
use skycast_ai::GeminiConfig;
use skycast_conversation::{ExchangeConfig, SessionConfig};
use skycast_weather::WeatherConfig;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Language model backend.
    pub model: GeminiConfig,

    /// Weather data provider.
    pub weather: WeatherConfig,

    /// Session retention.
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Exchange settings.
    #[serde(default)]
    pub exchange: ExchangeConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(
            config::Config::builder().add_source(
                config::Environment::with_prefix("SKYCAST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}
