//! WebSocket message types: envelope, kinds, payloads and outbound frames.
//!
//! Every frame is `{"type": <kind>, "payload": {...}}`. Inbound frames are
//! decoded in two steps: the [`Envelope`] borrows the payload as raw JSON,
//! then the handler for the [`MessageKind`] decodes the typed payload it
//! needs. Rebroadcast payloads are forwarded from the raw slice, byte for
//! byte.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::domain::{DEFAULT_RATING, Player, PlayerId};
use crate::error::ManagerError;

/// Inbound frame with the payload left undecoded.
#[derive(Debug, Deserialize)]
pub struct Envelope<'a> {
    /// Message kind discriminator.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Kind-specific payload.
    #[serde(borrow, default)]
    pub payload: Option<&'a RawValue>,
}

impl<'a> Envelope<'a> {
    /// Parses the outer frame.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Decode`] if the text is not a JSON object or
    /// `type` is not a string.
    pub fn parse(text: &'a str) -> Result<Self, ManagerError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Closed set of message kinds accepted from game servers and the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Connection introduces itself, optionally with the admin key.
    ServerHello,
    /// Admin starts the tournament.
    TournamentStart,
    /// Admin stops the tournament.
    TournamentStop,
    /// A server pushes its player roster.
    UsersInServer,
    /// A server reports a finished match.
    MatchResults,
    /// A server announces a match start.
    MatchBegan,
    /// A server reports who is in which arena.
    MatchDetails,
    /// A server publishes a live score.
    SetMatchScore,
    /// A server cancels the match in an arena.
    MatchCancel,
}

impl MessageKind {
    /// Every kind, in protocol order.
    pub const ALL: [Self; 9] = [
        Self::ServerHello,
        Self::TournamentStart,
        Self::TournamentStop,
        Self::UsersInServer,
        Self::MatchResults,
        Self::MatchBegan,
        Self::MatchDetails,
        Self::SetMatchScore,
        Self::MatchCancel,
    ];

    /// Resolves a wire `type` string.
    #[must_use]
    pub fn from_wire(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }

    /// Returns the wire `type` string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerHello => "ServerHello",
            Self::TournamentStart => "TournamentStart",
            Self::TournamentStop => "TournamentStop",
            Self::UsersInServer => "UsersInServer",
            Self::MatchResults => "MatchResults",
            Self::MatchBegan => "MatchBegan",
            Self::MatchDetails => "MatchDetails",
            Self::SetMatchScore => "SetMatchScore",
            Self::MatchCancel => "MatchCancel",
        }
    }
}

/// Decodes a typed payload; an absent payload decodes as the default.
///
/// # Errors
///
/// Returns [`ManagerError::Decode`] when the payload does not match `T`.
pub fn decode_payload<T>(payload: Option<&RawValue>) -> Result<T, ManagerError>
where
    T: DeserializeOwned + Default,
{
    match payload {
        Some(raw) => Ok(serde_json::from_str(raw.get())?),
        None => Ok(T::default()),
    }
}

/// `ServerHello` payload.
#[derive(Debug, Default, Deserialize)]
pub struct ServerHello {
    /// Shared secret; equals the admin key for the admin controller.
    #[serde(rename = "apiKey", default)]
    pub api_key: String,
}

/// One roster entry of `UsersInServer`.
#[derive(Debug, Deserialize)]
pub struct RosterEntry {
    /// Platform account id.
    #[serde(rename = "steamId", default)]
    pub steam_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Rating; defaults to [`DEFAULT_RATING`].
    #[serde(default = "default_rating")]
    pub elo: i64,
}

impl From<RosterEntry> for Player {
    fn from(entry: RosterEntry) -> Self {
        Player::new(PlayerId::new(entry.steam_id), entry.name, entry.elo)
    }
}

fn default_rating() -> i64 {
    DEFAULT_RATING
}

/// `UsersInServer` payload.
#[derive(Debug, Default, Deserialize)]
pub struct UsersInServer {
    /// Full roster; absent means "nothing to do".
    #[serde(default)]
    pub players: Option<Vec<RosterEntry>>,
}

/// `MatchResults` payload.
#[derive(Debug, Default, Deserialize)]
pub struct MatchResults {
    /// Winner identity.
    #[serde(default)]
    pub winner: String,
    /// Loser identity.
    #[serde(default)]
    pub loser: String,
    /// 1-based arena number.
    #[serde(default)]
    pub arena: i64,
}

/// `MatchBegan` payload. `p1Id`/`p2Id` win over the short forms.
#[derive(Debug, Default, Deserialize)]
pub struct MatchBegan {
    #[serde(rename = "p1Id", default)]
    p1_id: Option<String>,
    #[serde(default)]
    p1: Option<String>,
    #[serde(rename = "p2Id", default)]
    p2_id: Option<String>,
    #[serde(default)]
    p2: Option<String>,
}

impl MatchBegan {
    /// Returns the first player's identity.
    #[must_use]
    pub fn player1(&self) -> &str {
        self.p1_id.as_deref().or(self.p1.as_deref()).unwrap_or_default()
    }

    /// Returns the second player's identity.
    #[must_use]
    pub fn player2(&self) -> &str {
        self.p2_id.as_deref().or(self.p2.as_deref()).unwrap_or_default()
    }
}

/// Fields of `MatchDetails` the relay reads; the rest passes through.
#[derive(Debug, Default, Deserialize)]
pub struct MatchDetails {
    /// 1-based arena number.
    #[serde(rename = "arenaId", default)]
    pub arena_id: i64,
    /// First player's identity.
    #[serde(rename = "p1Id", default)]
    pub p1_id: String,
    /// Second player's identity.
    #[serde(rename = "p2Id", default)]
    pub p2_id: String,
}

/// `MatchCancel` payload.
#[derive(Debug, Default, Deserialize)]
pub struct MatchCancel {
    /// 1-based arena number.
    #[serde(default)]
    pub arena: i64,
}

/// Payload of an outbound `Error` frame.
#[derive(Debug, Serialize)]
pub struct ErrorNotice<'a> {
    /// Human-readable reason.
    pub message: &'a str,
}

/// Outbound frame.
#[derive(Debug, Serialize)]
pub struct Outbound<'a, P: Serialize> {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// Kind-specific payload.
    pub payload: P,
}

/// Empty payload, serialized as `{}`.
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

/// Serializes a frame with the given kind and payload.
///
/// # Errors
///
/// Returns [`ManagerError::Decode`] if the payload fails to serialize.
pub fn encode<P: Serialize>(kind: &str, payload: P) -> Result<String, ManagerError> {
    Ok(serde_json::to_string(&Outbound { kind, payload })?)
}

/// Frame that forwards a payload verbatim; an absent payload becomes `{}`.
///
/// # Errors
///
/// Returns [`ManagerError::Decode`] if serialization fails.
pub fn encode_raw(kind: MessageKind, payload: Option<&RawValue>) -> Result<String, ManagerError> {
    match payload {
        Some(raw) => encode(kind.as_str(), raw),
        None => encode(kind.as_str(), Empty {}),
    }
}

/// `Error{message}` frame.
///
/// # Errors
///
/// Returns [`ManagerError::Decode`] if serialization fails.
pub fn encode_error(message: &str) -> Result<String, ManagerError> {
    encode("Error", ErrorNotice { message })
}
