//! Weather data adapters.
//!
//! Every adapter that needs coordinates resolves them through
//! [`WeatherService::geocode`]; none of them parse location text on their own.
//! Adapters are stateless with respect to the conversation and never retry.

use crate::config::WeatherConfig;
use crate::error::AdapterError;
use crate::forecast::{daily_lines, round_degrees};
use crate::model::{
    AirQuality, CurrentPayload, CurrentWeather, ForecastPayload, GeocodeHit, Location, MapTile,
    MapType, Units,
};
use crate::source::{HttpJsonSource, JsonSource};
use crate::tile::{MAX_ZOOM, fill_template, tile_indices};
use rootcause::Report;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Follow-up attached to current conditions.
pub const WEATHER_FOLLOW_UP: &str = "Would you like to know the 5 day forecast?";

/// Follow-up attached to air quality data.
pub const AIR_QUALITY_FOLLOW_UP: &str =
    "Would you like me to provide the coordinates for this location?";

/// Adapters over the configured weather provider.
#[derive(Clone)]
pub struct WeatherService {
    source: Arc<dyn JsonSource>,
    config: WeatherConfig,
}

impl std::fmt::Debug for WeatherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherService")
            .field("geocode_url", &self.config.geocode_url)
            .finish_non_exhaustive()
    }
}

impl WeatherService {
    /// Creates a service over an arbitrary JSON source.
    #[must_use]
    pub fn new(source: Arc<dyn JsonSource>, config: WeatherConfig) -> Self {
        Self { source, config }
    }

    /// Creates a service that talks to the provider over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: WeatherConfig) -> Result<Self, Report<AdapterError>> {
        let source = HttpJsonSource::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(Arc::new(source), config))
    }

    /// Resolves free text to a single location.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the provider has no match.
    #[instrument(skip(self))]
    pub async fn geocode(&self, location: &str) -> Result<Location, Report<AdapterError>> {
        let url = &self.config.geocode_url;
        let query = [
            ("q", location.to_string()),
            ("limit", "1".to_string()),
            ("appid", self.config.api_key.clone()),
        ];
        let hits: Vec<GeocodeHit> = self.fetch(url, &query).await?;

        let Some(hit) = hits.into_iter().next() else {
            info!("no geocoding match");
            return Err(AdapterError::NotFound {
                location: location.to_string(),
            }
            .into());
        };

        info!(lat = hit.lat, lon = hit.lon, "resolved location");
        Ok(hit.into())
    }

    /// Current conditions as a one-line summary.
    ///
    /// # Errors
    ///
    /// Propagates geocoding and provider failures.
    #[instrument(skip(self))]
    pub async fn current_weather(
        &self,
        location: &str,
        units: Units,
    ) -> Result<CurrentWeather, Report<AdapterError>> {
        let place = self.geocode(location).await?;
        let url = &self.config.current_url;
        let mut query = self.coordinates_query(&place);
        query.push(("units", units.provider_system().to_string()));
        let payload: CurrentPayload = self.fetch(url, &query).await?;

        let condition = payload
            .weather
            .first()
            .map(|condition| capitalize(&condition.description))
            .ok_or_else(|| AdapterError::MalformedPayload {
                endpoint: url.clone(),
                reason: "no weather conditions".to_string(),
            })?;
        let temp = round_degrees(payload.main.temp);

        info!("fetched current weather");
        Ok(CurrentWeather {
            summary: format!("{location}: {condition}, {temp}{units}"),
            follow_up: WEATHER_FOLLOW_UP.to_string(),
        })
    }

    /// Up to five day-lines aggregated from the sub-daily forecast feed.
    ///
    /// # Errors
    ///
    /// Propagates geocoding and provider failures.
    #[instrument(skip(self))]
    pub async fn forecast(
        &self,
        location: &str,
        units: Units,
    ) -> Result<Vec<String>, Report<AdapterError>> {
        let place = self.geocode(location).await?;
        let mut query = self.coordinates_query(&place);
        query.push(("units", units.provider_system().to_string()));
        let payload: ForecastPayload = self.fetch(&self.config.forecast_url, &query).await?;

        let lines = daily_lines(&payload, units);
        info!(days = lines.len(), "fetched forecast");
        Ok(lines)
    }

    /// Air quality data, passed through as the provider sent it.
    ///
    /// # Errors
    ///
    /// Propagates geocoding and provider failures.
    #[instrument(skip(self))]
    pub async fn air_quality(&self, location: &str) -> Result<AirQuality, Report<AdapterError>> {
        let place = self.geocode(location).await?;
        let query = self.coordinates_query(&place);
        let payload: JsonValue = self.fetch(&self.config.air_quality_url, &query).await?;

        info!("fetched air quality");
        Ok(AirQuality {
            air_quality: payload,
            follow_up: AIR_QUALITY_FOLLOW_UP.to_string(),
        })
    }

    /// The map tile covering a location.
    ///
    /// Zoom levels above the provider maximum are capped.
    ///
    /// # Errors
    ///
    /// Propagates geocoding failures. No other request is made.
    #[instrument(skip(self))]
    pub async fn map_tile(
        &self,
        location: &str,
        zoom: u8,
        map_type: MapType,
    ) -> Result<MapTile, Report<AdapterError>> {
        let place = self.geocode(location).await?;
        let zoom = zoom.min(MAX_ZOOM);
        let (tile_x, tile_y) = tile_indices(place.latitude, place.longitude, zoom);
        let (served, template) = self.config.tiles.template(map_type);
        if served != map_type {
            info!(requested = ?map_type, "map type not configured, serving standard tiles");
        }

        Ok(MapTile {
            tile_url: fill_template(template, zoom, tile_x, tile_y),
            latitude: place.latitude,
            longitude: place.longitude,
            zoom,
            tile_x,
            tile_y,
            map_type: served,
        })
    }

    fn coordinates_query(&self, place: &Location) -> Vec<(&'static str, String)> {
        vec![
            ("lat", place.latitude.to_string()),
            ("lon", place.longitude.to_string()),
            ("appid", self.config.api_key.clone()),
        ]
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, Report<AdapterError>> {
        let value = self.source.get_json(url, query).await.inspect_err(|report| {
            warn!(kind = "upstream", endpoint = url, error = %report.current_context(), "provider request failed");
        })?;

        serde_json::from_value(value).map_err(|e| {
            warn!(kind = "upstream", endpoint = url, error = %e, "provider payload has unexpected shape");
            AdapterError::MalformedPayload {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
