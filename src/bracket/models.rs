//! Bracket-service wire records and the pure logic built on them.
//!
//! The service wraps every record in a single-key object
//! (`{"participant": {...}}`, `{"match": {...}}`). Participants carry the
//! relay's player identity in `misc`, which is how bracket-internal ids are
//! mapped back to [`PlayerId`]s.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{Entrant, PendingMatch, PlayerId};
use crate::error::BracketError;

/// Bodies shorter than this (after trimming) are not real answers.
pub const MIN_BODY_LEN: usize = 2;

/// `{"tournament": {...}}`
#[derive(Debug, Deserialize)]
pub struct TournamentEnvelope {
    /// The tournament record.
    pub tournament: TournamentRecord,
}

/// Fields of a tournament the relay uses.
#[derive(Debug, Deserialize)]
pub struct TournamentRecord {
    /// Bracket-internal tournament id.
    pub id: i64,
}

/// `{"participant": {...}}`
#[derive(Debug, Deserialize)]
pub struct ParticipantEnvelope {
    /// The participant record.
    pub participant: ParticipantRecord,
}

/// A registered participant.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantRecord {
    /// Bracket-internal participant id.
    pub id: i64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Relay player identity stored at registration.
    #[serde(default)]
    pub misc: Option<String>,
}

impl ParticipantRecord {
    /// Relay identity stored with the participant, if any.
    #[must_use]
    pub fn player_id(&self) -> Option<PlayerId> {
        self.misc
            .as_deref()
            .filter(|misc| !misc.is_empty())
            .map(PlayerId::new)
    }
}

/// `{"match": {...}}`
#[derive(Debug, Deserialize)]
pub struct MatchEnvelope {
    /// The match record.
    #[serde(rename = "match")]
    pub record: MatchRecord,
}

/// A bracket match.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchRecord {
    /// Bracket-internal match id.
    pub id: i64,
    /// First participant, once seeded.
    #[serde(default)]
    pub player1_id: Option<i64>,
    /// Second participant, once seeded.
    #[serde(default)]
    pub player2_id: Option<i64>,
    /// Winning participant, once reported.
    #[serde(default)]
    pub winner_id: Option<i64>,
}

/// Body of a participant registration.
#[derive(Debug, Serialize)]
pub struct NewParticipant<'a> {
    /// API key.
    pub api_key: &'a str,
    /// Participant fields.
    pub participant: NewParticipantFields<'a>,
}

/// Participant fields sent on registration.
#[derive(Debug, Serialize)]
pub struct NewParticipantFields<'a> {
    /// Display name.
    pub name: &'a str,
    /// 1-based seed.
    pub seed: u32,
    /// Relay identity, echoed back when listing participants.
    pub misc: &'a str,
}

impl<'a> NewParticipant<'a> {
    /// Builds the registration body for an entrant.
    #[must_use]
    pub fn new(api_key: &'a str, entrant: &'a Entrant) -> Self {
        Self {
            api_key,
            participant: NewParticipantFields {
                name: &entrant.name,
                seed: entrant.seed,
                misc: entrant.id.as_str(),
            },
        }
    }
}

/// Body of a bare POST that only authenticates.
#[derive(Debug, Serialize)]
pub struct KeyOnly<'a> {
    /// API key.
    pub api_key: &'a str,
}

/// Body of a match result update.
#[derive(Debug, Serialize)]
pub struct MatchUpdate<'a> {
    /// API key.
    pub api_key: &'a str,
    /// Result fields.
    #[serde(rename = "match")]
    pub result: MatchUpdateFields,
}

/// Result fields of a match update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchUpdateFields {
    /// `1-0` when player 1 won, `0-1` otherwise.
    pub scores_csv: &'static str,
    /// Winning participant id.
    pub winner_id: i64,
}

/// A result ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReport {
    /// Match to update.
    pub match_id: i64,
    /// Fields to send.
    pub fields: MatchUpdateFields,
}

/// Validates and decodes a response body.
///
/// # Errors
///
/// Returns [`BracketError::ShortBody`] for an implausibly short body,
/// [`BracketError::Remote`] when the body carries an `errors` payload, and
/// [`BracketError::Decode`] when it does not match `T`.
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, BracketError> {
    let trimmed = body.trim();
    if trimmed.len() < MIN_BODY_LEN {
        return Err(BracketError::ShortBody(trimmed.len()));
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)?;
    if let Some(errors) = value.get("errors") {
        return Err(BracketError::Remote(errors.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

/// Maps participant ids to `(identity, name)`, skipping participants
/// registered without an identity.
fn index_participants(participants: &[ParticipantRecord]) -> HashMap<i64, (PlayerId, &str)> {
    participants
        .iter()
        .filter_map(|p| p.player_id().map(|id| (p.id, (id, p.name.as_str()))))
        .collect()
}

/// Turns open bracket matches into pairings the allocator understands.
///
/// Matches missing a player, already carrying a winner, or naming a
/// participant without a relay identity are dropped. Service order is kept.
#[must_use]
pub fn resolve_open_matches(
    matches: &[MatchRecord],
    participants: &[ParticipantRecord],
) -> Vec<PendingMatch> {
    let index = index_participants(participants);
    matches
        .iter()
        .filter(|m| m.winner_id.is_none())
        .filter_map(|m| {
            let (p1, p1_name) = index.get(&m.player1_id?)?;
            let (p2, p2_name) = index.get(&m.player2_id?)?;
            Some(PendingMatch {
                player1: p1.clone(),
                player1_name: (*p1_name).to_string(),
                player2: p2.clone(),
                player2_name: (*p2_name).to_string(),
            })
        })
        .collect()
}

/// Finds the open match between two players and builds its score update.
///
/// # Errors
///
/// Returns [`BracketError::UnknownParticipant`] when either identity has no
/// participant, and [`BracketError::MatchNotFound`] when no unfinished match
/// pairs them.
pub fn find_report(
    matches: &[MatchRecord],
    participants: &[ParticipantRecord],
    winner: &PlayerId,
    loser: &PlayerId,
) -> Result<ScoreReport, BracketError> {
    let participant_of = |id: &PlayerId| {
        participants
            .iter()
            .find(|p| p.player_id().as_ref() == Some(id))
            .map(|p| p.id)
            .ok_or_else(|| BracketError::UnknownParticipant(id.clone()))
    };
    let winner_pid = participant_of(winner)?;
    let loser_pid = participant_of(loser)?;

    matches
        .iter()
        .filter(|m| m.winner_id.is_none())
        .find_map(|m| {
            let (p1, p2) = (m.player1_id?, m.player2_id?);
            let scores_csv = if (p1, p2) == (winner_pid, loser_pid) {
                "1-0"
            } else if (p1, p2) == (loser_pid, winner_pid) {
                "0-1"
            } else {
                return None;
            };
            Some(ScoreReport {
                match_id: m.id,
                fields: MatchUpdateFields {
                    scores_csv,
                    winner_id: winner_pid,
                },
            })
        })
        .ok_or_else(|| BracketError::MatchNotFound(winner.clone(), loser.clone()))
}
