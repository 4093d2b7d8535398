//! Roster and pairing types.

use serde::Serialize;

use super::PlayerId;

/// Rating assumed when a roster entry does not carry one.
pub const DEFAULT_RATING: i64 = 1000;

/// One entry of the current roster.
///
/// A roster is always replaced wholesale, either from a game server's
/// `UsersInServer` push or from the plugin's `get_players` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    /// Stable external identity.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Skill rating used for seeding.
    pub rating: i64,
    /// Plugin-assigned client id, when the roster came from the plugin.
    pub client_id: Option<i64>,
    /// Whether the plugin reports the player inside an arena.
    pub in_arena: bool,
}

impl Player {
    /// Creates a player without plugin metadata.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, rating: i64) -> Self {
        Self {
            id,
            name: name.into(),
            rating,
            client_id: None,
            in_arena: false,
        }
    }
}

/// A participant registration derived from the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrant {
    /// Identity recorded with the bracket service.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// 1-based seed.
    pub seed: u32,
}

/// Orders the roster by descending rating and numbers the seeds.
///
/// The sort is stable, so equal ratings keep their roster order.
#[must_use]
pub fn seed_entrants(players: &mut [Player]) -> Vec<Entrant> {
    players.sort_by(|a, b| b.rating.cmp(&a.rating));
    players
        .iter()
        .zip(1u32..)
        .map(|(player, seed)| Entrant {
            id: player.id.clone(),
            name: player.name.clone(),
            seed,
        })
        .collect()
}

/// An unplayed, fully seeded pairing reported by the bracket service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMatch {
    /// First player's identity.
    pub player1: PlayerId,
    /// First player's display name.
    pub player1_name: String,
    /// Second player's identity.
    pub player2: PlayerId,
    /// Second player's display name.
    pub player2_name: String,
}
