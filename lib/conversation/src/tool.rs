//! Tool registry.
//!
//! The catalog of capabilities advertised to the model is fixed at build
//! time. [`ToolRegistry::weather`] is the only public constructor and the
//! registry offers no way to add or remove tools afterwards; the dispatcher
//! checks its bindings against this catalog on startup.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use skycast_ai::FunctionDeclaration;
use skycast_weather::tile::MAX_ZOOM;

/// Resolves a place name to coordinates.
pub const GEOCODE: &str = "geocode";
/// Current conditions.
pub const GET_WEATHER: &str = "get_weather";
/// Five day forecast.
pub const GET_FORECAST: &str = "get_forecast";
/// Air quality.
pub const GET_AIR_QUALITY: &str = "get_air_quality";
/// Map tile URL.
pub const GET_MAP_TILE_URL: &str = "get_map_tile_url";

/// Declarative contract of one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Natural-language purpose, used by the model to judge relevance.
    pub description: String,
    /// JSON schema for input parameters.
    pub parameters: JsonValue,
}

impl ToolSpec {
    /// Creates a tool spec with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    /// Sets the parameter schema.
    #[must_use]
    pub fn with_parameters(mut self, schema: JsonValue) -> Self {
        self.parameters = schema;
        self
    }

    /// Names of the parameters the schema marks as required.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .get("required")
            .and_then(JsonValue::as_array)
            .into_iter()
            .flatten()
            .filter_map(JsonValue::as_str)
    }

    /// Converts the spec to the model's declaration format.
    #[must_use]
    pub fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Closed catalog of tools, in declaration order.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// The weather assistant's catalog.
    #[must_use]
    pub fn weather() -> Self {
        let location = json!({
            "type": "string",
            "description": "The location name (city or country)",
        });
        let units = json!({
            "type": "string",
            "description": "Temperature units (Celsius or Fahrenheit)",
            "enum": ["C", "F"],
        });

        Self::from_specs(vec![
            ToolSpec::new(
                GET_WEATHER,
                "Retrieves the CURRENT weather for a location such as a city or country. \
                 Use this when the user asks about current weather conditions.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {"location": location, "units": units},
                "required": ["location", "units"],
            })),
            ToolSpec::new(
                GET_FORECAST,
                "Retrieves the 5 day FORECAST for a location. \
                 Use this when the user asks about future weather or a forecast.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {"location": location, "units": units},
                "required": ["location", "units"],
            })),
            ToolSpec::new(
                GET_AIR_QUALITY,
                "Retrieves the air quality for a location. \
                 Use this when the user asks about air quality or pollution.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {"location": location},
                "required": ["location"],
            })),
            ToolSpec::new(
                GEOCODE,
                "Resolves a location to its latitude and longitude. \
                 Use this when the user asks for the coordinates of a location.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {"location": location},
                "required": ["location"],
            })),
            ToolSpec::new(
                GET_MAP_TILE_URL,
                "Builds a map tile URL covering a location. \
                 Use this when the user asks for a map of a location.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "location": location,
                    "zoom": {
                        "type": "integer",
                        "description": format!("Zoom level from 0 to {MAX_ZOOM}, default 10"),
                    },
                    "map_type": {
                        "type": "string",
                        "description": "Map style",
                        "enum": ["standard", "satellite", "terrain"],
                    },
                },
                "required": ["location"],
            })),
        ])
    }

    pub(crate) fn from_specs(specs: Vec<ToolSpec>) -> Self {
        Self { specs }
    }

    /// Gets a tool spec by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Returns all specs in declaration order.
    pub fn all(&self) -> impl Iterator<Item = &ToolSpec> {
        self.specs.iter()
    }

    /// Returns all tool names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    /// The full schema bundle for a model call.
    #[must_use]
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.specs.iter().map(ToolSpec::declaration).collect()
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn weather_catalog_names() {
        let registry = ToolRegistry::weather();
        let names: HashSet<_> = registry.names().collect();

        assert_eq!(registry.len(), 5);
        assert_eq!(
            names,
            HashSet::from([GEOCODE, GET_WEATHER, GET_FORECAST, GET_AIR_QUALITY, GET_MAP_TILE_URL])
        );
    }

    #[test]
    fn required_parameters() {
        let registry = ToolRegistry::weather();

        let weather: Vec<_> = registry.get(GET_WEATHER).expect("declared").required().collect();
        let tile: Vec<_> = registry
            .get(GET_MAP_TILE_URL)
            .expect("declared")
            .required()
            .collect();

        assert_eq!(weather, vec!["location", "units"]);
        assert_eq!(tile, vec!["location"]);
    }

    #[test]
    fn spec_without_required_list() {
        let spec = ToolSpec::new("ping", "Checks liveness");
        assert_eq!(spec.required().count(), 0);
    }

    #[test]
    fn declarations_match_specs() {
        let registry = ToolRegistry::weather();
        let declarations = registry.declarations();

        assert_eq!(declarations.len(), registry.len());
        let forecast = declarations
            .iter()
            .find(|declaration| declaration.name == GET_FORECAST)
            .expect("forecast declared");
        assert_eq!(forecast.parameters["properties"]["units"]["enum"], json!(["C", "F"]));
    }

    #[test]
    fn unknown_name_is_absent() {
        assert!(ToolRegistry::weather().get("get_forcast").is_none());
    }
}
