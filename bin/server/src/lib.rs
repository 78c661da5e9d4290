//! HTTP front end for the skycast weather assistant.
//!
//! Exposes the conversation core over JSON: chat exchanges, session
//! listing and removal, and a health check.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
