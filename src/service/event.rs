//! Events consumed by the orchestrator and the handle used to send them.
//!
//! Transport tasks never touch core state. They translate socket activity
//! into [`Event`]s and push them through an [`OrchestratorHandle`]; the
//! orchestrator task applies them one at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use utoipa::ToSchema;

use crate::bracket::BracketReply;
use crate::domain::{ArenaOccupancy, ConnectionId, Outbox};
use crate::error::ManagerError;
use crate::plugin::LinkState;
use crate::ws::registry::SessionCounts;

/// Input to the orchestrator loop.
#[derive(Debug)]
pub enum Event {
    /// An inbound WebSocket finished its handshake.
    SessionOpened {
        /// Connection handle.
        id: ConnectionId,
        /// Queue drained by the connection's writer.
        outbox: Arc<Outbox>,
    },
    /// An inbound WebSocket closed.
    SessionClosed {
        /// Connection handle.
        id: ConnectionId,
    },
    /// A text frame arrived on an inbound WebSocket.
    SessionFrame {
        /// Connection handle.
        id: ConnectionId,
        /// Raw frame text.
        text: String,
    },
    /// The plugin link started a connect attempt.
    PluginConnecting,
    /// The plugin link completed its handshake.
    PluginConnected {
        /// Queue drained by the link's writer.
        outbox: Arc<Outbox>,
    },
    /// The plugin link closed or failed to connect.
    PluginDisconnected,
    /// A text frame arrived from the plugin.
    PluginFrame {
        /// Raw frame text.
        text: String,
    },
    /// A bracket job finished.
    Bracket(BracketReply),
    /// Request for a state snapshot.
    Status(oneshot::Sender<StatusSnapshot>),
}

/// Point-in-time view of the relay served by `GET /status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusSnapshot {
    /// Whether a tournament is running.
    pub active: bool,
    /// Tournament epoch; bumps on every start and stop.
    pub epoch: u64,
    /// When the running tournament was started.
    pub started_at: Option<DateTime<Utc>>,
    /// Plugin link state.
    pub plugin: LinkState,
    /// Inbound connections by role.
    pub connections: SessionCounts,
    /// Size of the current roster.
    pub players: usize,
    /// Occupancy of every arena.
    pub arenas: Vec<ArenaOccupancy>,
}

/// Cloneable sender side of the orchestrator's event channel.
///
/// Every method fails with [`ManagerError::Unavailable`] once the
/// orchestrator loop has stopped.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl OrchestratorHandle {
    /// Creates a handle and the receiver the orchestrator loop consumes.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Sends a raw event.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn send(&self, event: Event) -> Result<(), ManagerError> {
        self.tx.send(event).map_err(|_| ManagerError::Unavailable)
    }

    /// Announces a new inbound session.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn open_session(&self, id: ConnectionId, outbox: Arc<Outbox>) -> Result<(), ManagerError> {
        self.send(Event::SessionOpened { id, outbox })
    }

    /// Announces that an inbound session closed.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn close_session(&self, id: ConnectionId) -> Result<(), ManagerError> {
        self.send(Event::SessionClosed { id })
    }

    /// Forwards an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn deliver(&self, id: ConnectionId, text: String) -> Result<(), ManagerError> {
        self.send(Event::SessionFrame { id, text })
    }

    /// Reports a plugin connect attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn plugin_connecting(&self) -> Result<(), ManagerError> {
        self.send(Event::PluginConnecting)
    }

    /// Reports a completed plugin handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn plugin_connected(&self, outbox: Arc<Outbox>) -> Result<(), ManagerError> {
        self.send(Event::PluginConnected { outbox })
    }

    /// Reports that the plugin link went down.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn plugin_disconnected(&self) -> Result<(), ManagerError> {
        self.send(Event::PluginDisconnected)
    }

    /// Forwards a plugin text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn plugin_frame(&self, text: String) -> Result<(), ManagerError> {
        self.send(Event::PluginFrame { text })
    }

    /// Hands a finished bracket job back to the loop.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped.
    pub fn bracket(&self, reply: BracketReply) -> Result<(), ManagerError> {
        self.send(Event::Bracket(reply))
    }

    /// Asks the loop for a [`StatusSnapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Unavailable`] if the loop has stopped or
    /// drops the request.
    pub async fn status(&self) -> Result<StatusSnapshot, ManagerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Event::Status(reply_tx))?;
        reply_rx.await.map_err(|_| ManagerError::Unavailable)
    }

    /// Returns `true` once the loop has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
