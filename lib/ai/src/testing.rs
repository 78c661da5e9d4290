//! Scripted [`ModelBackend`] for tests.

use crate::backend::{Content, FunctionCall, ModelBackend, ModelRequest, ModelResponse};
use crate::error::ModelError;
use async_trait::async_trait;
use rootcause::Report;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::Mutex;

const SCRIPTED_MODEL: &str = "scripted";

/// Answers model calls with queued responses, in order, and records every request.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    /// Creates a backend with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a plain text response.
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ModelResponse::new(Content::model_text(text), SCRIPTED_MODEL)));
        self
    }

    /// Queues a function-call response.
    ///
    /// `args` must be a JSON object; anything else is sent as no arguments.
    #[must_use]
    pub fn call(self, name: impl Into<String>, args: JsonValue) -> Self {
        let args = match args {
            JsonValue::Object(map) => map,
            _ => JsonMap::new(),
        };
        let content = Content::function_call(FunctionCall::new(name, args));
        self.push(Ok(ModelResponse::new(content, SCRIPTED_MODEL)));
        self
    }

    /// Queues an arbitrary response.
    #[must_use]
    pub fn respond(self, response: ModelResponse) -> Self {
        self.push(Ok(response));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, error: ModelError) -> Self {
        self.push(Err(error));
        self
    }

    /// Returns every request seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn push(&self, reply: Result<ModelResponse, ModelError>) {
        self.replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(reply);
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, Report<ModelError>> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();

        match reply {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(error.into()),
            None => Err(ModelError::RequestFailed {
                reason: "no scripted response".to_string(),
                status: None,
            }
            .into()),
        }
    }

    fn model(&self) -> &str {
        SCRIPTED_MODEL
    }
}
