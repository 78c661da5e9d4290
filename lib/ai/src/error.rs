//! Error types for the AI crate.

use std::fmt;

/// Errors from model backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The request could not be delivered or the provider rejected it.
    RequestFailed {
        reason: String,
        status: Option<u16>,
    },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed {
                reason,
                status: Some(status),
            } => {
                write!(f, "model request failed with status {status}: {reason}")
            }
            Self::RequestFailed {
                reason,
                status: None,
            } => {
                write!(f, "model request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse model response: {reason}")
            }
            Self::Timeout => write!(f, "model request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid model configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for ModelError {}
