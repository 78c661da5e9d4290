//! Error types for the weather crate.

use std::fmt;

/// Errors from weather data adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The geocoding provider returned no match for the location text.
    NotFound { location: String },
    /// The provider answered with a non-success status or could not be reached.
    Upstream {
        endpoint: String,
        status: Option<u16>,
        reason: String,
    },
    /// The provider answered, but the payload did not have the expected shape.
    MalformedPayload { endpoint: String, reason: String },
}

impl AdapterError {
    /// Creates an upstream error without a status code.
    #[must_use]
    pub fn unreachable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upstream {
            endpoint: endpoint.into(),
            status: None,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { location } => write!(f, "location not found: {location}"),
            Self::Upstream {
                endpoint,
                status: Some(status),
                reason,
            } => {
                write!(f, "weather provider {endpoint} returned {status}: {reason}")
            }
            Self::Upstream {
                endpoint,
                status: None,
                reason,
            } => {
                write!(f, "weather provider {endpoint} unreachable: {reason}")
            }
            Self::MalformedPayload { endpoint, reason } => {
                write!(f, "unexpected payload from {endpoint}: {reason}")
            }
        }
    }
}

impl std::error::Error for AdapterError {}
