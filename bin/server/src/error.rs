//! HTTP error responses.
//!
//! Internal error text is logged, never returned; response bodies carry a
//! fixed message and, for aborted exchanges, the failure kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rootcause::Report;
use serde_json::json;
use skycast_conversation::{ExchangeError, ExchangeErrorKind, SessionError};
use std::fmt;

/// Errors returned by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The chat message was empty or whitespace.
    EmptyMessage,
    /// No live session has this identifier.
    SessionNotFound { id: String },
    /// The exchange was aborted by the error policy.
    ExchangeAborted {
        kind: ExchangeErrorKind,
        details: String,
    },
    /// Anything else, typically a session storage failure.
    Internal { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "message must not be empty"),
            Self::SessionNotFound { id } => write!(f, "session '{id}' not found"),
            Self::ExchangeAborted { kind, details } => {
                write!(f, "exchange aborted ({kind}): {details}")
            }
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::EmptyMessage => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ExchangeAborted {
                kind: ExchangeErrorKind::TimedOut,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            Self::ExchangeAborted {
                kind: ExchangeErrorKind::ModelCall,
                ..
            } => StatusCode::BAD_GATEWAY,
            Self::ExchangeAborted { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "Message must not be empty",
            Self::SessionNotFound { .. } => "Session not found",
            Self::ExchangeAborted {
                kind: ExchangeErrorKind::TimedOut,
                ..
            } => "The assistant took too long to respond",
            Self::ExchangeAborted { .. } => "The assistant is unavailable right now",
            Self::Internal { .. } => "Internal server error",
        }
    }
}

impl From<Report<ExchangeError>> for ApiError {
    fn from(report: Report<ExchangeError>) -> Self {
        match report.current_context() {
            ExchangeError::Aborted { kind, .. } => Self::ExchangeAborted {
                kind: *kind,
                details: report.to_string(),
            },
            ExchangeError::Storage { .. } => Self::Internal {
                details: report.to_string(),
            },
        }
    }
}

impl From<Report<SessionError>> for ApiError {
    fn from(report: Report<SessionError>) -> Self {
        match report.current_context() {
            SessionError::NotFound { id } => Self::SessionNotFound { id: id.to_string() },
            SessionError::StorageFailed { .. } => Self::Internal {
                details: report.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = match &self {
            Self::ExchangeAborted { kind, .. } => {
                json!({ "error": self.public_message(), "error_kind": kind })
            }
            _ => json!({ "error": self.public_message() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::SessionId;

    #[test]
    fn statuses_follow_failure_kind() {
        assert_eq!(
            ApiError::EmptyMessage.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let aborted = |kind| ApiError::ExchangeAborted {
            kind,
            details: String::new(),
        };
        assert_eq!(
            aborted(ExchangeErrorKind::TimedOut).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            aborted(ExchangeErrorKind::ModelCall).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            aborted(ExchangeErrorKind::Upstream).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            aborted(ExchangeErrorKind::UnknownTool).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn session_not_found_maps_to_404() {
        let id = SessionId::new();
        let report: Report<SessionError> = SessionError::NotFound { id }.into();
        let error = ApiError::from(report);

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert!(error.to_string().contains(&id.to_string()));
    }

    #[test]
    fn aborted_exchange_keeps_kind() {
        let report: Report<ExchangeError> = ExchangeError::Aborted {
            kind: ExchangeErrorKind::ModelCall,
            reason: "status 500".to_string(),
        }
        .into();

        match ApiError::from(report) {
            ApiError::ExchangeAborted { kind, .. } => assert_eq!(kind, ExchangeErrorKind::ModelCall),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
