//! Weather provider configuration.

use crate::model::MapType;
use serde::Deserialize;

/// Endpoints and credentials for the weather data provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    /// Provider API key, sent as the `appid` query parameter.
    pub api_key: String,

    /// Direct geocoding endpoint.
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    /// Current conditions endpoint.
    #[serde(default = "default_current_url")]
    pub current_url: String,

    /// Multi-day forecast endpoint (sub-daily samples).
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Air pollution endpoint.
    #[serde(default = "default_air_quality_url")]
    pub air_quality_url: String,

    /// Timeout applied to every provider request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Map tile URL templates.
    #[serde(default)]
    pub tiles: TileProviders,
}

fn default_geocode_url() -> String {
    "https://api.openweathermap.org/geo/1.0/direct".to_string()
}

fn default_current_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".to_string()
}

fn default_forecast_url() -> String {
    "https://api.openweathermap.org/data/2.5/forecast".to_string()
}

fn default_air_quality_url() -> String {
    "https://api.openweathermap.org/data/2.5/air_pollution".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

impl WeatherConfig {
    /// Creates a configuration with the default provider endpoints.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            geocode_url: default_geocode_url(),
            current_url: default_current_url(),
            forecast_url: default_forecast_url(),
            air_quality_url: default_air_quality_url(),
            timeout_secs: default_timeout_secs(),
            tiles: TileProviders::default(),
        }
    }
}

/// URL templates with literal `{z}`, `{x}` and `{y}` placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct TileProviders {
    /// Street map tiles; always available.
    #[serde(default = "default_standard_template")]
    pub standard: String,

    /// Satellite imagery tiles.
    #[serde(default)]
    pub satellite: Option<String>,

    /// Terrain tiles.
    #[serde(default)]
    pub terrain: Option<String>,
}

fn default_standard_template() -> String {
    "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
}

impl Default for TileProviders {
    fn default() -> Self {
        Self {
            standard: default_standard_template(),
            satellite: None,
            terrain: None,
        }
    }
}

impl TileProviders {
    /// Resolves the template for a map type.
    ///
    /// Satellite and terrain fall back to the standard template when they
    /// are not configured; the returned map type is the one actually served.
    #[must_use]
    pub fn template(&self, map_type: MapType) -> (MapType, &str) {
        let configured = match map_type {
            MapType::Standard => None,
            MapType::Satellite => self.satellite.as_deref(),
            MapType::Terrain => self.terrain.as_deref(),
        };
        match configured {
            Some(template) => (map_type, template),
            None => (MapType::Standard, self.standard.as_str()),
        }
    }
}
