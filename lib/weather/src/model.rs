//! Weather domain types and provider payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A place resolved from free text by the geocoding adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Provider's canonical name for the place.
    pub name: String,
    /// ISO country code, empty when the provider does not report one.
    pub country: String,
}

/// Temperature units requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    /// Degrees Celsius.
    #[default]
    #[serde(rename = "C")]
    Celsius,
    /// Degrees Fahrenheit.
    #[serde(rename = "F")]
    Fahrenheit,
}

impl Units {
    /// The provider's unit-system parameter.
    #[must_use]
    pub fn provider_system(self) -> &'static str {
        match self {
            Self::Celsius => "metric",
            Self::Fahrenheit => "imperial",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius => write!(f, "C"),
            Self::Fahrenheit => write!(f, "F"),
        }
    }
}

/// Map tile style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    /// Street map.
    #[default]
    Standard,
    /// Satellite imagery.
    Satellite,
    /// Terrain relief.
    Terrain,
}

/// Current conditions as a one-line summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// `"<location>: <Condition>, <temp><units>"`.
    pub summary: String,
    /// Suggested next question.
    pub follow_up: String,
}

/// Air quality payload, passed through from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    /// Provider payload, unmodified.
    pub air_quality: JsonValue,
    /// Suggested next question.
    pub follow_up: String,
}

/// A slippy-map tile covering a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTile {
    /// Tile URL with zoom and indices substituted.
    pub tile_url: String,
    /// Latitude of the resolved location.
    pub latitude: f64,
    /// Longitude of the resolved location.
    pub longitude: f64,
    /// Zoom level.
    pub zoom: u8,
    /// Column index.
    pub tile_x: u32,
    /// Row index.
    pub tile_y: u32,
    /// Tile style that was served.
    pub map_type: MapType,
}

/// One geocoding match.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeocodeHit {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: String,
}

impl From<GeocodeHit> for Location {
    fn from(hit: GeocodeHit) -> Self {
        Self {
            latitude: hit.lat,
            longitude: hit.lon,
            name: hit.name,
            country: hit.country,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConditionPayload {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MainPayload {
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CurrentPayload {
    pub weather: Vec<ConditionPayload>,
    pub main: MainPayload,
}

/// Forecast feed: samples at sub-daily granularity.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForecastPayload {
    pub list: Vec<ForecastEntry>,
    #[serde(default)]
    pub city: Option<CityPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForecastEntry {
    /// Unix seconds.
    pub dt: i64,
    pub main: MainPayload,
    pub weather: Vec<ConditionPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CityPayload {
    /// Offset from UTC in seconds.
    #[serde(default)]
    pub timezone: i32,
}
