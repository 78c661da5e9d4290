//! Shared handler state.

use skycast_conversation::{Orchestrator, SessionStore};
use std::sync::Arc;
use std::time::Instant;

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runs chat exchanges.
    pub orchestrator: Arc<Orchestrator>,
    /// When the server started.
    pub started_at: Instant,
}

impl AppState {
    /// Creates state around an orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: Instant::now(),
        }
    }

    /// The session store the orchestrator writes to.
    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        self.orchestrator.store()
    }
}
