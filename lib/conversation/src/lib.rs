//! Conversation core for skycast.
//!
//! This crate provides:
//!
//! - **Tool Registry**: the closed catalog of weather tools offered to the model
//! - **Dispatcher**: typed handlers bound to the registry, checked at startup
//! - **Session Store**: per-session turn history with expiry and eviction
//! - **Orchestrator**: the two-phase model exchange and its error policy

pub mod dispatch;
pub mod error;
pub mod locks;
pub mod message;
pub mod orchestrator;
pub mod policy;
pub mod prompt;
pub mod session;
pub mod tool;

pub use dispatch::{Dispatcher, ToolArgs, ToolBinding};
pub use error::{DispatchError, ExchangeError, ExchangeErrorKind, RegistryError, SessionError};
pub use locks::KeyedLocks;
pub use message::{Turn, TurnRole};
pub use orchestrator::{ChatRequest, ChatResponse, ExchangeConfig, Orchestrator};
pub use policy::{
    ErrorOutcome, ErrorPolicy, ErrorPolicyKind, ExchangeFailure, HardenedErrorPolicy,
    TranscriptErrorPolicy,
};
pub use session::{InMemorySessionStore, Session, SessionConfig, SessionStore, SessionSummary};
pub use tool::{ToolRegistry, ToolSpec};
