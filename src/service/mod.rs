//! Service layer: the orchestrator task and its event interface.

pub mod event;
pub mod orchestrator;

pub use event::{Event, OrchestratorHandle, StatusSnapshot};
pub use orchestrator::{Orchestrator, TournamentState};
