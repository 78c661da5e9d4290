//! Weather data adapters for skycast.
//!
//! This crate provides:
//!
//! - **Adapters**: geocoding, current conditions, forecast, air quality and
//!   map tiles over an OpenWeatherMap-compatible provider
//! - **JSON source**: the HTTP seam adapters fetch through
//! - **Tile math**: Web-Mercator slippy-map indices

pub mod config;
pub mod error;
pub mod forecast;
pub mod model;
pub mod service;
pub mod source;
pub mod tile;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{TileProviders, WeatherConfig};
pub use error::AdapterError;
pub use model::{AirQuality, CurrentWeather, Location, MapTile, MapType, Units};
pub use service::{AIR_QUALITY_FOLLOW_UP, WEATHER_FOLLOW_UP, WeatherService};
pub use source::{HttpJsonSource, JsonSource};
