//! Error policies.
//!
//! What failed is an [`ExchangeFailure`]; what the user sees is decided by an
//! [`ErrorPolicy`].

use crate::error::ExchangeErrorKind;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// A failure that ended an exchange before a final reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeFailure {
    /// Classification.
    pub kind: ExchangeErrorKind,
    /// Human-readable description of the underlying error.
    pub message: String,
}

impl ExchangeFailure {
    /// Creates a failure.
    #[must_use]
    pub fn new(kind: ExchangeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// How an exchange failure is surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorOutcome {
    /// Reply and record the user turn and the reply in history.
    Persist { reply: String },
    /// Reply without touching history.
    Reply { reply: String },
    /// Return a structured error and leave history untouched.
    Abort,
}

/// Decides the outcome of a failed exchange.
pub trait ErrorPolicy: Send + Sync + fmt::Debug {
    /// Maps a failure to an outcome.
    fn decide(&self, failure: &ExchangeFailure) -> ErrorOutcome;
}

/// Keeps internal error text out of history.
///
/// A location that cannot be found is the user's to fix, so the apology is
/// kept. Provider and tool-contract failures get a reply that is not
/// recorded; model failures and timeouts abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardenedErrorPolicy;

/// Apology for a location the provider could not resolve.
pub const NOT_FOUND_REPLY: &str = "Sorry, I couldn't find that location. \
    Could you check the spelling or try a nearby city?";

/// Reply for provider failures.
pub const UPSTREAM_REPLY: &str =
    "The weather service isn't responding right now. Please try again in a moment.";

/// Reply for tool-contract failures.
pub const CONTRACT_REPLY: &str = "Sorry, I couldn't complete that request. Could you rephrase it?";

impl ErrorPolicy for HardenedErrorPolicy {
    fn decide(&self, failure: &ExchangeFailure) -> ErrorOutcome {
        let kind = failure.kind;
        if kind.is_model_side() {
            ErrorOutcome::Abort
        } else if kind.is_contract_violation() {
            ErrorOutcome::Reply {
                reply: CONTRACT_REPLY.to_string(),
            }
        } else if kind == ExchangeErrorKind::NotFound {
            ErrorOutcome::Persist {
                reply: NOT_FOUND_REPLY.to_string(),
            }
        } else {
            ErrorOutcome::Reply {
                reply: UPSTREAM_REPLY.to_string(),
            }
        }
    }
}

/// Records every failure in history as an assistant turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptErrorPolicy;

impl ErrorPolicy for TranscriptErrorPolicy {
    fn decide(&self, failure: &ExchangeFailure) -> ErrorOutcome {
        ErrorOutcome::Persist {
            reply: format!("An error occurred: {}", failure.message),
        }
    }
}

/// Configurable choice of policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicyKind {
    /// [`HardenedErrorPolicy`].
    #[default]
    Hardened,
    /// [`TranscriptErrorPolicy`].
    Transcript,
}

impl ErrorPolicyKind {
    /// Instantiates the policy.
    #[must_use]
    pub fn build(self) -> Arc<dyn ErrorPolicy> {
        match self {
            Self::Hardened => Arc::new(HardenedErrorPolicy),
            Self::Transcript => Arc::new(TranscriptErrorPolicy),
        }
    }
}
