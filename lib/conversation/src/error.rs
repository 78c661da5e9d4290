//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `RegistryError`: tool catalog and dispatcher bindings disagree
//! - `DispatchError`: a model-declared tool call could not be served
//! - `SessionError`: session store operations
//! - `ExchangeError`: an exchange ended without a reply

use serde::{Deserialize, Serialize};
use skycast_core::SessionId;
use skycast_weather::AdapterError;
use std::fmt;

/// Closed classification of every failure that can end an exchange early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeErrorKind {
    /// The location could not be geocoded.
    NotFound,
    /// A weather provider failed or answered with an unexpected payload.
    Upstream,
    /// The model asked for a tool that has no binding.
    UnknownTool,
    /// The model's arguments do not satisfy the tool's parameters.
    InvalidArguments,
    /// The language model call failed.
    ModelCall,
    /// The exchange exceeded its deadline.
    TimedOut,
}

impl ExchangeErrorKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Upstream => "upstream",
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::ModelCall => "model_call",
            Self::TimedOut => "timed_out",
        }
    }

    /// Returns true for registry/model drift rather than a runtime fault.
    #[must_use]
    pub fn is_contract_violation(self) -> bool {
        matches!(self, Self::UnknownTool | Self::InvalidArguments)
    }

    /// Returns true when the fault lies with the model service or the
    /// exchange deadline rather than with the tools.
    #[must_use]
    pub fn is_model_side(self) -> bool {
        matches!(self, Self::ModelCall | Self::TimedOut)
    }
}

impl fmt::Display for ExchangeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when the tool catalog and the dispatcher bindings disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A declared tool has no handler.
    MissingBinding { name: String },
    /// A handler exists for a tool that is not declared.
    UndeclaredBinding { name: String },
    /// Two handlers were registered under one name.
    DuplicateBinding { name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBinding { name } => write!(f, "tool '{name}' is declared but has no binding"),
            Self::UndeclaredBinding { name } => {
                write!(f, "binding '{name}' has no declared tool")
            }
            Self::DuplicateBinding { name } => write!(f, "tool '{name}' is bound twice"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Errors from dispatching a model-declared tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No binding exists for the name.
    UnknownTool { name: String },
    /// Required arguments are missing or have the wrong shape.
    InvalidArguments { name: String, reason: String },
    /// The adapter behind the tool failed.
    Adapter { name: String, error: AdapterError },
}

impl DispatchError {
    /// Classifies the failure.
    #[must_use]
    pub fn kind(&self) -> ExchangeErrorKind {
        match self {
            Self::UnknownTool { .. } => ExchangeErrorKind::UnknownTool,
            Self::InvalidArguments { .. } => ExchangeErrorKind::InvalidArguments,
            Self::Adapter {
                error: AdapterError::NotFound { .. },
                ..
            } => ExchangeErrorKind::NotFound,
            Self::Adapter { .. } => ExchangeErrorKind::Upstream,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool { name } => write!(f, "unknown tool: {name}"),
            Self::InvalidArguments { name, reason } => {
                write!(f, "invalid arguments for tool '{name}': {reason}")
            }
            Self::Adapter { name, error } => write!(f, "tool '{name}' failed: {error}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session not found, or expired.
    NotFound { id: SessionId },
    /// Storage operation failed.
    StorageFailed { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "session not found: {id}"),
            Self::StorageFailed { reason } => {
                write!(f, "session storage failed: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors that end an exchange without a reply for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The error policy chose to abort; history was left untouched.
    Aborted {
        kind: ExchangeErrorKind,
        reason: String,
    },
    /// The session store failed (use as context wrapper).
    Storage { session_id: Option<SessionId> },
}

impl ExchangeError {
    /// Returns the failure kind of an aborted exchange.
    #[must_use]
    pub fn kind(&self) -> Option<ExchangeErrorKind> {
        match self {
            Self::Aborted { kind, .. } => Some(*kind),
            Self::Storage { .. } => None,
        }
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted { kind, reason } => write!(f, "exchange aborted ({kind}): {reason}"),
            Self::Storage {
                session_id: Some(id),
            } => write!(f, "session storage failed for {id}"),
            Self::Storage { session_id: None } => write!(f, "session storage failed"),
        }
    }
}

impl std::error::Error for ExchangeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_failures_are_classified() {
        let not_found = DispatchError::Adapter {
            name: "get_weather".to_string(),
            error: AdapterError::NotFound {
                location: "Atlantis".to_string(),
            },
        };
        let upstream = DispatchError::Adapter {
            name: "get_weather".to_string(),
            error: AdapterError::unreachable("weather", "timed out"),
        };

        assert_eq!(not_found.kind(), ExchangeErrorKind::NotFound);
        assert_eq!(upstream.kind(), ExchangeErrorKind::Upstream);
        assert!(not_found.to_string().contains("Atlantis"));
    }

    #[test]
    fn contract_kinds() {
        assert!(ExchangeErrorKind::UnknownTool.is_contract_violation());
        assert!(ExchangeErrorKind::InvalidArguments.is_contract_violation());
        assert!(!ExchangeErrorKind::Upstream.is_contract_violation());
        assert!(ExchangeErrorKind::TimedOut.is_model_side());
        assert!(!ExchangeErrorKind::Upstream.is_model_side());
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&ExchangeErrorKind::TimedOut).expect("serialize"),
            "\"timed_out\""
        );
        assert_eq!(ExchangeErrorKind::ModelCall.to_string(), "model_call");
    }

    #[test]
    fn session_error_display() {
        let err = SessionError::NotFound {
            id: SessionId::new(),
        };
        assert!(err.to_string().contains("session not found: sess_"));
    }
}
