//! Arena-plugin link protocol.
//!
//! Inbound frames are flat JSON objects discriminated by `type`; events are
//! further discriminated by `event`. Unknown kinds decode to an `Other`
//! variant so they can be dropped without being treated as errors.

use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_RATING, Player, PlayerId};

/// Frame received from the plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginMessage {
    /// Sent by the plugin right after the socket opens.
    Welcome {
        /// Greeting text.
        #[serde(default)]
        message: String,
    },
    /// Answer to a command.
    Response(PluginResponse),
    /// Asynchronous game event.
    Event(PluginEvent),
    /// A command succeeded.
    Success {
        /// Detail text.
        #[serde(default)]
        message: String,
    },
    /// A command failed.
    Error {
        /// Detail text.
        #[serde(default)]
        message: String,
    },
    /// Any other `type`.
    #[serde(other)]
    Other,
}

/// Command a response answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCommand {
    /// Player roster.
    GetPlayers,
    /// Arena list.
    GetArenas,
    /// Anything else.
    #[serde(other)]
    Other,
}

impl Default for ResponseCommand {
    fn default() -> Self {
        Self::Other
    }
}

/// `response` frame body.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginResponse {
    /// Which command this answers.
    #[serde(default)]
    pub command: ResponseCommand,
    /// Roster, for `get_players`.
    #[serde(default)]
    pub players: Option<Vec<PluginPlayer>>,
    /// Arena descriptors, for `get_arenas`. Kept opaque.
    #[serde(default)]
    pub arenas: Option<Vec<serde_json::Value>>,
}

/// One roster entry reported by the plugin.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginPlayer {
    /// Plugin client id.
    #[serde(default)]
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Arena the plugin has the player in (0 when none).
    #[serde(default)]
    pub arena: i64,
    /// Whether the player is inside an arena.
    #[serde(rename = "inArena", default)]
    pub in_arena: bool,
    /// Rating; defaults to [`DEFAULT_RATING`].
    #[serde(default = "default_rating")]
    pub elo: i64,
}

fn default_rating() -> i64 {
    DEFAULT_RATING
}

impl From<&PluginPlayer> for Player {
    fn from(p: &PluginPlayer) -> Self {
        Self {
            id: PlayerId::from_client_id(p.id),
            name: p.name.clone(),
            rating: p.elo,
            client_id: Some(p.id),
            in_arena: p.in_arena,
        }
    }
}

/// `event` frame body.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event")]
pub enum PluginEvent {
    /// A scored 1v1 match finished.
    #[serde(rename = "match_end_1v1")]
    MatchEnd {
        /// Winner's client id.
        #[serde(default)]
        winner_id: i64,
        /// Loser's client id.
        #[serde(default)]
        loser_id: i64,
        /// 1-based arena number.
        #[serde(default)]
        arena_id: i64,
        /// Winner's display name.
        #[serde(default)]
        winner_name: String,
        /// Loser's display name.
        #[serde(default)]
        loser_name: String,
    },
    /// A player left an arena without a scorable result.
    #[serde(rename = "player_arena_removed")]
    PlayerArenaRemoved {
        /// Client id of the player who left.
        #[serde(default)]
        player_id: i64,
        /// 1-based arena number.
        #[serde(default)]
        arena_id: i64,
    },
    /// Any other event.
    #[serde(other)]
    Other,
}

/// Command sent to the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PluginCommand {
    /// Request the player roster.
    GetPlayers,
    /// Request the arena list.
    GetArenas,
    /// Move a client into an arena.
    AddPlayerToArena {
        /// Plugin client id.
        player_id: i64,
        /// 1-based arena number.
        arena_id: usize,
    },
}
