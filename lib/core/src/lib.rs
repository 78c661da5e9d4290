//! Core domain types and utilities for skycast.
//!
//! This crate provides the identifiers and error plumbing shared by the
//! conversation core, the model backends and the weather adapters.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ExchangeId, ParseIdError, SessionId};
