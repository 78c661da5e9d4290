//! Model backend abstraction.
//!
//! Describes one call to a function-calling language model: role-tagged
//! contents, the function declarations the model may invoke, a system
//! instruction and a sampling temperature. A response is either text or a
//! single function-call directive.

use crate::error::ModelError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// The role of a content block in the model's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Content authored by the user, including function results fed back.
    User,
    /// Content authored by the model.
    Model,
}

/// A function the model asked to have invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Declared function name.
    pub name: String,
    /// Arguments as a JSON object.
    #[serde(default)]
    pub args: JsonMap<String, JsonValue>,
}

impl FunctionCall {
    /// Creates a new function call.
    #[must_use]
    pub fn new(name: impl Into<String>, args: JsonMap<String, JsonValue>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// The result of a function call, handed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Name of the function that produced the result.
    pub name: String,
    /// Opaque result payload.
    pub response: JsonValue,
}

/// One part of a content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Plain text.
    Text(String),
    /// A function-call directive.
    FunctionCall(FunctionCall),
    /// A function result.
    FunctionResponse(FunctionResponse),
}

impl Part {
    /// Returns the text of a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A role-tagged block of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Who authored the content.
    pub role: ModelRole,
    /// The parts, in order.
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a user text block.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Creates a model text block.
    #[must_use]
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Creates a model block holding a single function call.
    #[must_use]
    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            role: ModelRole::Model,
            parts: vec![Part::FunctionCall(call)],
        }
    }

    /// Creates a user block carrying a function result.
    #[must_use]
    pub fn function_response(name: impl Into<String>, response: JsonValue) -> Self {
        Self {
            role: ModelRole::User,
            parts: vec![Part::FunctionResponse(FunctionResponse {
                name: name.into(),
                response,
            })],
        }
    }

    /// Concatenates all text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name.
    pub name: String,
    /// Natural-language purpose, used by the model to judge relevance.
    pub description: String,
    /// JSON schema of the parameters object.
    pub parameters: JsonValue,
}

/// A request to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// System instruction, if any.
    pub system_instruction: Option<String>,
    /// Conversation contents in order.
    pub contents: Vec<Content>,
    /// Functions the model may call.
    pub tools: Vec<FunctionDeclaration>,
    /// Temperature for sampling.
    pub temperature: Option<f32>,
}

impl ModelRequest {
    /// Creates a request over the given contents.
    #[must_use]
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            system_instruction: None,
            contents,
            tools: Vec::new(),
            temperature: None,
        }
    }

    /// Adds a system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Sets the callable functions.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<FunctionDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A response from a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated content block.
    pub content: Content,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

impl ModelResponse {
    /// Creates a response from generated content.
    #[must_use]
    pub fn new(content: Content, model: impl Into<String>) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            model: model.into(),
        }
    }

    /// Returns the function call when it is the first part of the response.
    ///
    /// Only the first part is inspected; responses carrying several calls
    /// are not supported.
    #[must_use]
    pub fn function_call(&self) -> Option<&FunctionCall> {
        match self.content.parts.first() {
            Some(Part::FunctionCall(call)) => Some(call),
            _ => None,
        }
    }

    /// Returns the concatenated text of the response.
    #[must_use]
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for model backends.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generates a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the model call fails.
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, Report<ModelError>>;

    /// Returns the model name.
    fn model(&self) -> &str;
}
