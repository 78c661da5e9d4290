//! Tool dispatcher.
//!
//! Maps a model-declared function name to exactly one typed handler. The
//! handler table is built once and must cover the registry exactly: a
//! declared tool without a handler, or a handler without a declared tool, is
//! rejected by [`Dispatcher::new`].

use crate::error::{DispatchError, RegistryError};
use crate::tool::{
    GEOCODE, GET_AIR_QUALITY, GET_FORECAST, GET_MAP_TILE_URL, GET_WEATHER, ToolRegistry,
};
use futures::future::BoxFuture;
use rootcause::Report;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use skycast_weather::tile::{DEFAULT_ZOOM, MAX_ZOOM};
use skycast_weather::{AdapterError, MapType, Units, WeatherService};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, instrument};

type Handler = Box<
    dyn Fn(JsonMap<String, JsonValue>) -> BoxFuture<'static, Result<JsonValue, Report<DispatchError>>>
        + Send
        + Sync,
>;

/// Typed tool arguments.
pub trait ToolArgs: DeserializeOwned + Send + 'static {
    /// Checks constraints the schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the arguments are unusable.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A handler bound to a tool name.
pub struct ToolBinding {
    name: String,
    handler: Handler,
}

impl ToolBinding {
    /// Binds a typed handler.
    ///
    /// Arguments are deserialized into `A` and validated before `handler`
    /// runs; adapter failures are passed through as [`DispatchError::Adapter`].
    pub fn typed<A, F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        A: ToolArgs,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JsonValue, Report<AdapterError>>> + Send + 'static,
    {
        let name = name.into();
        let tool = name.clone();
        let handler: Handler = Box::new(move |args| {
            let tool = tool.clone();
            let parsed = serde_json::from_value::<A>(JsonValue::Object(args))
                .map_err(|e| e.to_string())
                .and_then(|args| args.validate().map(|()| args));
            let call = parsed.map(&handler);
            Box::pin(async move {
                let call = call.map_err(|reason| DispatchError::InvalidArguments {
                    name: tool.clone(),
                    reason,
                })?;
                call.await.map_err(|report| {
                    let error = report.current_context().clone();
                    report.context(DispatchError::Adapter { name: tool, error })
                })
            })
        });
        Self { name, handler }
    }

    /// The tool name this binding serves.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Resolves tool calls against the registry.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    handlers: HashMap<String, Handler>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut bound: Vec<_> = self.handlers.keys().collect();
        bound.sort();
        f.debug_struct("Dispatcher").field("bound", &bound).finish()
    }
}

impl Dispatcher {
    /// Builds a dispatcher whose bindings cover the registry exactly.
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` if a declared tool has no binding, a binding
    /// has no declared tool, or a name is bound twice.
    pub fn new(
        registry: Arc<ToolRegistry>,
        bindings: Vec<ToolBinding>,
    ) -> Result<Self, Report<RegistryError>> {
        let mut handlers = HashMap::with_capacity(bindings.len());
        for binding in bindings {
            if registry.get(&binding.name).is_none() {
                return Err(RegistryError::UndeclaredBinding { name: binding.name }.into());
            }
            if handlers.contains_key(&binding.name) {
                return Err(RegistryError::DuplicateBinding { name: binding.name }.into());
            }
            handlers.insert(binding.name, binding.handler);
        }

        if let Some(missing) = registry.names().find(|name| !handlers.contains_key(*name)) {
            return Err(RegistryError::MissingBinding {
                name: missing.to_string(),
            }
            .into());
        }

        Ok(Self { registry, handlers })
    }

    /// Binds the weather catalog to a [`WeatherService`].
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` if the registry is not the weather catalog.
    pub fn weather(
        registry: Arc<ToolRegistry>,
        service: Arc<WeatherService>,
    ) -> Result<Self, Report<RegistryError>> {
        let geocode = Arc::clone(&service);
        let current = Arc::clone(&service);
        let forecast = Arc::clone(&service);
        let air = Arc::clone(&service);
        let tile = service;

        Self::new(
            registry,
            vec![
                ToolBinding::typed(GEOCODE, move |args: LocationArgs| {
                    let service = Arc::clone(&geocode);
                    async move {
                        let location = service.geocode(&args.location).await?;
                        Ok::<_, Report<AdapterError>>(json!(location))
                    }
                }),
                ToolBinding::typed(GET_WEATHER, move |args: UnitsArgs| {
                    let service = Arc::clone(&current);
                    async move {
                        let weather = service.current_weather(&args.location, args.units).await?;
                        Ok::<_, Report<AdapterError>>(json!({
                            "weather": weather.summary,
                            "followups": weather.follow_up,
                        }))
                    }
                }),
                ToolBinding::typed(GET_FORECAST, move |args: UnitsArgs| {
                    let service = Arc::clone(&forecast);
                    async move {
                        let lines = service.forecast(&args.location, args.units).await?;
                        Ok::<_, Report<AdapterError>>(json!({"forecast": lines}))
                    }
                }),
                ToolBinding::typed(GET_AIR_QUALITY, move |args: LocationArgs| {
                    let service = Arc::clone(&air);
                    async move {
                        let air = service.air_quality(&args.location).await?;
                        Ok::<_, Report<AdapterError>>(json!({
                            "air_quality": air.air_quality,
                            "followups": air.follow_up,
                        }))
                    }
                }),
                ToolBinding::typed(GET_MAP_TILE_URL, move |args: MapTileArgs| {
                    let service = Arc::clone(&tile);
                    async move {
                        let tile = service
                            .map_tile(&args.location, args.zoom(), args.map_type)
                            .await?;
                        Ok::<_, Report<AdapterError>>(json!(tile))
                    }
                }),
            ],
        )
    }

    /// The registry this dispatcher serves.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invokes the tool bound to `name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTool` when nothing is bound to `name`,
    /// `InvalidArguments` when required parameters are missing or malformed,
    /// and `Adapter` with the adapter's error unchanged when the call fails.
    #[instrument(skip(self, args), fields(tool = %name))]
    pub async fn dispatch(
        &self,
        name: &str,
        args: &JsonMap<String, JsonValue>,
    ) -> Result<JsonValue, Report<DispatchError>> {
        let (Some(spec), Some(handler)) = (self.registry.get(name), self.handlers.get(name)) else {
            error!(kind = "tool_contract", tool = name, "model requested an unknown tool");
            return Err(DispatchError::UnknownTool {
                name: name.to_string(),
            }
            .into());
        };

        let missing: Vec<&str> = spec
            .required()
            .filter(|param| args.get(*param).is_none_or(JsonValue::is_null))
            .collect();
        if !missing.is_empty() {
            let reason = format!("missing required parameters: {}", missing.join(", "));
            error!(kind = "tool_contract", tool = name, %reason, "model sent incomplete arguments");
            return Err(DispatchError::InvalidArguments {
                name: name.to_string(),
                reason,
            }
            .into());
        }

        debug!(?args, "dispatching tool call");
        let result = handler(args.clone()).await;
        if let Err(report) = &result {
            let error = report.current_context();
            if error.kind().is_contract_violation() {
                error!(kind = "tool_contract", tool = name, %error, "model sent malformed arguments");
            }
        }
        result
    }
}

#[derive(Debug, Deserialize)]
struct LocationArgs {
    location: String,
}

impl ToolArgs for LocationArgs {}

#[derive(Debug, Deserialize)]
struct UnitsArgs {
    location: String,
    units: Units,
}

impl ToolArgs for UnitsArgs {}

#[derive(Debug, Deserialize)]
struct MapTileArgs {
    location: String,
    // Numbers from the model may arrive as floats (`10.0`).
    #[serde(default)]
    zoom: Option<f64>,
    #[serde(default)]
    map_type: MapType,
}

impl MapTileArgs {
    fn zoom(&self) -> u8 {
        self.zoom.map_or(DEFAULT_ZOOM, |zoom| zoom as u8)
    }
}

impl ToolArgs for MapTileArgs {
    fn validate(&self) -> Result<(), String> {
        match self.zoom {
            Some(zoom) if zoom.fract() != 0.0 || !(0.0..=f64::from(MAX_ZOOM)).contains(&zoom) => {
                Err(format!("zoom must be an integer from 0 to {MAX_ZOOM}, got {zoom}"))
            }
            _ => Ok(()),
        }
    }
}
