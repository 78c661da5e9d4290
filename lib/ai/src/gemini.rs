//! Gemini `generateContent` backend.
//!
//! Translates [`ModelRequest`] into the Gemini REST wire format and back.
//! Function results are sent as `functionResponse` parts; the first
//! candidate of the reply is the response.

use crate::backend::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, ModelBackend, ModelRequest,
    ModelResponse, ModelRole, Part, TokenUsage,
};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::StatusCode;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Configuration for the Gemini backend.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl GeminiConfig {
    /// Creates a configuration with default model, endpoint and timeout.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// A [`ModelBackend`] talking to the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the API key is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, Report<ModelError>> {
        if config.api_key.trim().is_empty() {
            return Err(ModelError::InvalidConfig {
                reason: "api_key is empty".to_string(),
            }
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    #[instrument(skip_all, fields(model = %self.config.model, contents = request.contents.len()))]
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, Report<ModelError>> {
        let body = WireRequest::from(request);

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            warn!(?retry_after_secs, "model rate limited");
            return Err(ModelError::RateLimited { retry_after_secs }.into());
        }

        let bytes = response.bytes().await.map_err(request_error)?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            return Err(ModelError::RequestFailed {
                reason: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                status: Some(status.as_u16()),
            }
            .into());
        }

        let parsed = parse_response(&bytes, &self.config.model)?;
        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            function_call = parsed.function_call().map(|call| call.name.as_str()),
            "model responded"
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn request_error(error: reqwest::Error) -> ModelError {
    if error.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::RequestFailed {
            reason: error.to_string(),
            status: error.status().map(|status| status.as_u16()),
        }
    }
}

fn parse_response(body: &[u8], model: &str) -> Result<ModelResponse, ModelError> {
    let wire: WireResponse =
        serde_json::from_slice(body).map_err(|e| ModelError::ResponseParseFailed {
            reason: e.to_string(),
        })?;

    let candidate =
        wire.candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ResponseParseFailed {
                reason: "response has no candidates".to_string(),
            })?;

    let parts = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(WirePart::into_part)
        .collect();

    let usage = wire
        .usage_metadata
        .map(|usage| TokenUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        })
        .unwrap_or_default();

    Ok(ModelResponse {
        content: Content {
            role: ModelRole::Model,
            parts,
        },
        usage,
        model: wire.model_version.unwrap_or_else(|| model.to_string()),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

impl From<&ModelRequest> for WireRequest {
    fn from(request: &ModelRequest) -> Self {
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![WireTool {
                function_declarations: request.tools.clone(),
            }]
        };

        Self {
            contents: request.contents.iter().map(WireContent::from).collect(),
            tools,
            system_instruction: request.system_instruction.as_ref().map(|text| WireContent {
                role: None,
                parts: vec![WirePart::text(text.clone())],
            }),
            generation_config: request
                .temperature
                .map(|temperature| WireGenerationConfig { temperature }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct WireGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<ModelRole>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

impl From<&Content> for WireContent {
    fn from(content: &Content) -> Self {
        Self {
            role: Some(content.role),
            parts: content.parts.iter().map(WirePart::from).collect(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl WirePart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }

    fn into_part(self) -> Option<Part> {
        if let Some(call) = self.function_call {
            return Some(Part::FunctionCall(FunctionCall::new(call.name, call.args)));
        }
        if let Some(response) = self.function_response {
            return Some(Part::FunctionResponse(response));
        }
        self.text.map(Part::Text)
    }
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self::text(text.clone()),
            Part::FunctionCall(call) => Self {
                function_call: Some(WireFunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                }),
                ..Self::default()
            },
            Part::FunctionResponse(response) => Self {
                function_response: Some(response.clone()),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: JsonMap<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    usage_metadata: Option<WireUsage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_gemini_field_names() {
        let request = ModelRequest::new(vec![
            Content::user_text("Weather in Berlin?"),
            Content::function_call(FunctionCall::new(
                "get_weather",
                json!({"location": "Berlin", "units": "C"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            )),
            Content::function_response("get_weather", json!({"result": {"weather": "ok"}})),
        ])
        .with_system_instruction("Be brief.")
        .with_tools(vec![FunctionDeclaration {
            name: "get_weather".to_string(),
            description: "Current weather".to_string(),
            parameters: json!({"type": "object"}),
        }])
        .with_temperature(0.7);

        let wire = serde_json::to_value(WireRequest::from(&request)).expect("serialize");

        assert_eq!(wire["contents"][0]["role"], "user");
        assert_eq!(wire["contents"][0]["parts"][0]["text"], "Weather in Berlin?");
        assert_eq!(wire["contents"][1]["role"], "model");
        assert_eq!(wire["contents"][1]["parts"][0]["functionCall"]["name"], "get_weather");
        assert_eq!(
            wire["contents"][2]["parts"][0]["functionResponse"]["response"]["result"]["weather"],
            "ok"
        );
        assert_eq!(wire["tools"][0]["functionDeclarations"][0]["name"], "get_weather");
        assert_eq!(wire["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert!(wire["systemInstruction"].get("role").is_none());
        assert!(wire["generationConfig"]["temperature"].as_f64().is_some());
    }

    #[test]
    fn request_without_tools_omits_tools_field() {
        let request = ModelRequest::new(vec![Content::user_text("hi")]);
        let wire = serde_json::to_value(WireRequest::from(&request)).expect("serialize");
        assert!(wire.get("tools").is_none());
        assert!(wire.get("generationConfig").is_none());
    }

    #[test]
    fn parses_function_call_response() {
        let body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "get_forecast", "args": {"location": "Paris", "units": "C"}}}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 8, "totalTokenCount": 128},
            "modelVersion": "gemini-2.5-flash"
        });

        let response =
            parse_response(body.to_string().as_bytes(), "fallback").expect("should parse");

        let call = response.function_call().expect("function call");
        assert_eq!(call.name, "get_forecast");
        assert_eq!(call.args["location"], "Paris");
        assert_eq!(response.usage.total(), 128);
        assert_eq!(response.model, "gemini-2.5-flash");
    }

    #[test]
    fn parses_text_response_and_skips_unknown_parts() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"thoughtSignature": "abc"}, {"text": "It is sunny."}]}
            }]
        });

        let response = parse_response(body.to_string().as_bytes(), "gemini").expect("should parse");

        assert!(response.function_call().is_none());
        assert_eq!(response.text(), "It is sunny.");
        assert_eq!(response.model, "gemini");
    }

    #[test]
    fn candidate_without_content_yields_empty_text() {
        let body = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let response = parse_response(body.to_string().as_bytes(), "gemini").expect("should parse");
        assert!(response.text().is_empty());
    }

    #[test]
    fn missing_candidates_is_a_parse_failure() {
        let err = parse_response(b"{\"candidates\": []}", "gemini").unwrap_err();
        assert!(matches!(err, ModelError::ResponseParseFailed { .. }));

        let err = parse_response(b"not json", "gemini").unwrap_err();
        assert!(matches!(err, ModelError::ResponseParseFailed { .. }));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = GeminiBackend::new(GeminiConfig::new("  ")).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ModelError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn endpoint_joins_base_url_and_model() {
        let mut config = GeminiConfig::new("key");
        config.base_url = "http://localhost:8080/".to_string();
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
