//! Language model primitives for skycast.
//!
//! This crate provides:
//!
//! - **Model contract**: role-tagged contents, function declarations and
//!   function-call directives shared by every backend
//! - **Gemini backend**: a `reqwest` client for `generateContent`

pub mod backend;
pub mod error;
pub mod gemini;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, ModelBackend, ModelRequest,
    ModelResponse, ModelRole, Part, TokenUsage,
};
pub use error::ModelError;
pub use gemini::{GeminiBackend, GeminiConfig};
