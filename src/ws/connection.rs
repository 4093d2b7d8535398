//! Read/write loop of one inbound WebSocket connection.
//!
//! The loop owns no relay state. Text frames go to the orchestrator as
//! they arrive; frames the orchestrator queues on the connection's
//! [`Outbox`] are written one per readiness signal.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::domain::{ConnectionId, Outbox};
use crate::service::OrchestratorHandle;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Registers the connection with the orchestrator.
/// - Forwards every text frame from the client.
/// - Writes queued outbound frames in FIFO order.
/// - Unregisters the connection when either side closes.
pub async fn run_connection(socket: WebSocket, orchestrator: OrchestratorHandle) {
    let id = ConnectionId::new();
    let outbox = Arc::new(Outbox::new());
    if orchestrator.open_session(id, Arc::clone(&outbox)).is_err() {
        tracing::warn!(connection_id = %id, "orchestrator stopped, refusing connection");
        return;
    }
    tracing::info!(connection_id = %id, "ws connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if orchestrator.deliver(id, text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(connection_id = %id, %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Output queued by the orchestrator
            () = outbox.ready() => {
                if let Some(frame) = outbox.take_next()
                    && ws_tx.send(Message::text(frame)).await.is_err()
                {
                    break;
                }
            }
        }
    }

    let _ = orchestrator.close_session(id);
    tracing::info!(connection_id = %id, "ws connection closed");
}
