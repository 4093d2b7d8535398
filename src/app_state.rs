//! Shared application state injected into all Axum handlers.

use crate::service::OrchestratorHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Channel into the orchestrator task.
    pub orchestrator: OrchestratorHandle,
}

impl AppState {
    /// Wraps an orchestrator handle.
    #[must_use]
    pub const fn new(orchestrator: OrchestratorHandle) -> Self {
        Self { orchestrator }
    }
}
