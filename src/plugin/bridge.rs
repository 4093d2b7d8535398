//! Plugin link state machine and client-id mapping.
//!
//! [`PluginBridge`] lives inside the orchestrator. It tracks whether the
//! link is usable, queues commands on the live connection's [`Outbox`], and
//! translates plugin frames into [`BridgeNotice`]s expressed in relay
//! identities. The link task in [`super::link`] does the actual I/O.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::messages::{PluginCommand, PluginEvent, PluginMessage, PluginResponse, ResponseCommand};
use crate::domain::{Outbox, Player, PlayerId};
use crate::error::ManagerError;

/// Connection state of the plugin link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No connection; sends are rejected.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Handshake complete; sends are queued.
    Connected,
}

/// Something the orchestrator has to act on, derived from a plugin frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeNotice {
    /// The plugin reported a fresh roster; the client maps already match it.
    RosterReplaced(Vec<Player>),
    /// A scored match finished between two known players.
    MatchEnded {
        /// Winner identity.
        winner: PlayerId,
        /// Loser identity.
        loser: PlayerId,
        /// 1-based arena number.
        arena: i64,
    },
    /// A known player left an arena without a result.
    ArenaVacated {
        /// 1-based arena number.
        arena: i64,
    },
}

/// Orchestrator-side view of the plugin link.
#[derive(Debug)]
pub struct PluginBridge {
    state: LinkState,
    outbox: Option<Arc<Outbox>>,
    client_to_player: HashMap<i64, PlayerId>,
    player_to_client: HashMap<PlayerId, i64>,
}

impl Default for PluginBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginBridge {
    /// Creates a disconnected bridge.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
            outbox: None,
            client_to_player: HashMap::new(),
            player_to_client: HashMap::new(),
        }
    }

    /// Returns the link state.
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Returns `true` when commands can be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Marks a connect attempt in flight.
    pub fn connecting(&mut self) {
        self.state = LinkState::Connecting;
    }

    /// Adopts a freshly connected link and its outbound queue.
    pub fn connected(&mut self, outbox: Arc<Outbox>) {
        self.state = LinkState::Connected;
        self.outbox = Some(outbox);
        tracing::info!("plugin link connected");
    }

    /// Drops the link and forgets every client mapping.
    pub fn disconnected(&mut self) {
        if self.state == LinkState::Connected {
            tracing::warn!("plugin link lost");
        }
        self.state = LinkState::Disconnected;
        self.outbox = None;
        self.client_to_player.clear();
        self.player_to_client.clear();
    }

    /// Queues a command on the live link.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::PluginDisconnected`] when the link is not
    /// connected (the command is dropped), or [`ManagerError::Decode`] if
    /// the command fails to serialize.
    pub fn send(&self, command: &PluginCommand) -> Result<(), ManagerError> {
        let outbox = match (&self.outbox, self.state) {
            (Some(outbox), LinkState::Connected) => outbox,
            _ => return Err(ManagerError::PluginDisconnected),
        };
        outbox.push(serde_json::to_string(command)?);
        Ok(())
    }

    /// Asks the plugin for its player roster.
    ///
    /// # Errors
    ///
    /// See [`PluginBridge::send`].
    pub fn request_players(&self) -> Result<(), ManagerError> {
        self.send(&PluginCommand::GetPlayers)
    }

    /// Asks the plugin for its arena list.
    ///
    /// # Errors
    ///
    /// See [`PluginBridge::send`].
    pub fn request_arenas(&self) -> Result<(), ManagerError> {
        self.send(&PluginCommand::GetArenas)
    }

    /// Moves a plugin client into a 1-based arena.
    ///
    /// # Errors
    ///
    /// See [`PluginBridge::send`].
    pub fn move_player(&self, client_id: i64, arena: usize) -> Result<(), ManagerError> {
        self.send(&PluginCommand::AddPlayerToArena {
            player_id: client_id,
            arena_id: arena,
        })
    }

    /// Plugin client id of a relay identity.
    #[must_use]
    pub fn client_for(&self, id: &PlayerId) -> Option<i64> {
        self.player_to_client.get(id).copied()
    }

    /// Relay identity of a plugin client id.
    #[must_use]
    pub fn player_for(&self, client_id: i64) -> Option<&PlayerId> {
        self.client_to_player.get(&client_id)
    }

    /// Number of mapped plugin clients.
    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.client_to_player.len()
    }

    /// Applies one plugin frame.
    ///
    /// Frames that fail to parse, carry no `type`, or have an unknown kind
    /// are logged and dropped.
    pub fn handle_frame(&mut self, text: &str) -> Option<BridgeNotice> {
        let message = match serde_json::from_str::<PluginMessage>(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(%err, "dropping unreadable plugin frame");
                return None;
            }
        };
        match message {
            PluginMessage::Welcome { message } => {
                tracing::info!(%message, "plugin welcome");
                for result in [self.request_arenas(), self.request_players()] {
                    if let Err(err) = result {
                        tracing::warn!(%err, "roster refresh not sent");
                    }
                }
                None
            }
            PluginMessage::Response(response) => self.on_response(response),
            PluginMessage::Event(event) => self.on_event(event),
            PluginMessage::Success { message } => {
                tracing::debug!(%message, "plugin command succeeded");
                None
            }
            PluginMessage::Error { message } => {
                tracing::warn!(%message, "plugin command failed");
                None
            }
            PluginMessage::Other => {
                tracing::debug!("ignoring plugin frame of unknown type");
                None
            }
        }
    }

    fn on_response(&mut self, response: PluginResponse) -> Option<BridgeNotice> {
        match response.command {
            ResponseCommand::GetPlayers => {
                let roster = response.players.unwrap_or_default();
                self.client_to_player.clear();
                self.player_to_client.clear();
                let players: Vec<Player> = roster.iter().map(Player::from).collect();
                for player in &players {
                    if let Some(client_id) = player.client_id {
                        self.client_to_player.insert(client_id, player.id.clone());
                        self.player_to_client.insert(player.id.clone(), client_id);
                    }
                }
                tracing::info!(players = players.len(), "plugin roster received");
                Some(BridgeNotice::RosterReplaced(players))
            }
            ResponseCommand::GetArenas => {
                let arenas = response.arenas.map_or(0, |a| a.len());
                tracing::info!(arenas, "plugin arena list received");
                None
            }
            ResponseCommand::Other => None,
        }
    }

    fn on_event(&self, event: PluginEvent) -> Option<BridgeNotice> {
        match event {
            PluginEvent::MatchEnd {
                winner_id,
                loser_id,
                arena_id,
                winner_name,
                loser_name,
            } => {
                let (Some(winner), Some(loser)) =
                    (self.player_for(winner_id), self.player_for(loser_id))
                else {
                    tracing::warn!(
                        winner_id,
                        loser_id,
                        arena_id,
                        "match end for unknown plugin clients ignored"
                    );
                    return None;
                };
                tracing::info!(%winner_name, %loser_name, arena_id, "plugin match ended");
                Some(BridgeNotice::MatchEnded {
                    winner: winner.clone(),
                    loser: loser.clone(),
                    arena: arena_id,
                })
            }
            PluginEvent::PlayerArenaRemoved {
                player_id,
                arena_id,
            } => {
                if self.player_for(player_id).is_none() {
                    tracing::debug!(player_id, arena_id, "arena removal for unknown client");
                    return None;
                }
                Some(BridgeNotice::ArenaVacated { arena: arena_id })
            }
            PluginEvent::Other => None,
        }
    }
}
