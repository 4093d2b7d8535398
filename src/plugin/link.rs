//! Outbound WebSocket connection to the arena plugin.
//!
//! The link task connects with `tokio-tungstenite`, reports every state
//! change to the orchestrator, forwards inbound text frames, and drains the
//! per-connection [`Outbox`]. When the socket drops it waits a fixed delay
//! and dials again. Each connection starts with an empty queue.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::domain::Outbox;
use crate::service::OrchestratorHandle;

/// Spawns the reconnecting link task.
///
/// The task ends once the orchestrator stops accepting events.
pub fn spawn(url: String, reconnect: Duration, orchestrator: OrchestratorHandle) -> JoinHandle<()> {
    tokio::spawn(run(url, reconnect, orchestrator))
}

async fn run(url: String, reconnect: Duration, orchestrator: OrchestratorHandle) {
    loop {
        if orchestrator.plugin_connecting().is_err() {
            break;
        }
        tracing::info!(%url, "connecting to plugin");
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                let outbox = Arc::new(Outbox::new());
                if orchestrator.plugin_connected(Arc::clone(&outbox)).is_err() {
                    break;
                }
                serve(stream, &outbox, &orchestrator).await;
            }
            Err(err) => {
                tracing::warn!(%url, %err, "plugin connect failed");
            }
        }
        if orchestrator.plugin_disconnected().is_err() {
            break;
        }
        tokio::time::sleep(reconnect).await;
    }
    tracing::debug!("plugin link task stopped");
}

/// Pumps one established connection until it closes.
async fn serve<S>(stream: WebSocketStream<S>, outbox: &Outbox, orchestrator: &OrchestratorHandle)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut tx, mut rx) = stream.split();

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if orchestrator.plugin_frame(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::warn!(%err, "plugin link read failed");
                        break;
                    }
                    _ => {}
                }
            }
            () = outbox.ready() => {
                if let Some(frame) = outbox.take_next()
                    && let Err(err) = tx.send(Message::text(frame)).await
                {
                    tracing::warn!(%err, "plugin link write failed");
                    break;
                }
            }
        }
    }
}
