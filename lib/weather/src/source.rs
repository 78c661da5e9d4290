//! HTTP access to the weather provider.
//!
//! Adapters never talk to `reqwest` directly; they fetch JSON through the
//! [`JsonSource`] trait so the provider can be swapped or scripted.

use crate::error::AdapterError;
use async_trait::async_trait;
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Source of JSON documents from an HTTP GET.
#[async_trait]
pub trait JsonSource: Send + Sync {
    /// Fetches `url` with the given query parameters and decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Upstream` on network failure, timeout or non-success status,
    /// and `MalformedPayload` when the body is not JSON.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<JsonValue, Report<AdapterError>>;
}

/// [`JsonSource`] backed by a `reqwest` client with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpJsonSource {
    client: reqwest::Client,
}

impl HttpJsonSource {
    /// Creates a source whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, Report<AdapterError>> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::unreachable("client", e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonSource for HttpJsonSource {
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<JsonValue, Report<AdapterError>> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                // The error text may embed the query string; keep only the kind.
                let reason = if e.is_timeout() {
                    "request timed out"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                AdapterError::unreachable(url, reason)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Upstream {
                endpoint: url.to_string(),
                status: Some(status.as_u16()),
                reason: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|_| AdapterError::unreachable(url, "response body interrupted"))?;
        debug!(endpoint = url, bytes = bytes.len(), "provider responded");

        serde_json::from_slice(&bytes).map_err(|e| {
            AdapterError::MalformedPayload {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}
