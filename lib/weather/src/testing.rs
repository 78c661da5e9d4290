//! Scripted [`JsonSource`] for tests.

use crate::error::AdapterError;
use crate::source::JsonSource;
use async_trait::async_trait;
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A request observed by [`ScriptedSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Requested URL.
    pub url: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Returns the value of a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Replies to requests with queued payloads, in order.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Result<JsonValue, AdapterError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedSource {
    /// Creates a source with no queued replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful payload.
    #[must_use]
    pub fn reply(self, payload: JsonValue) -> Self {
        self.push(Ok(payload));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, error: AdapterError) -> Self {
        self.push(Err(error));
        self
    }

    /// Returns every request seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn push(&self, reply: Result<JsonValue, AdapterError>) {
        self.replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(reply);
    }
}

#[async_trait]
impl JsonSource for ScriptedSource {
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<JsonValue, Report<AdapterError>> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedRequest {
                url: url.to_string(),
                query: query
                    .iter()
                    .map(|(key, value)| ((*key).to_string(), value.clone()))
                    .collect(),
            });

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();

        match reply {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(error)) => Err(error.into()),
            None => Err(AdapterError::unreachable(url, "no scripted reply").into()),
        }
    }
}
