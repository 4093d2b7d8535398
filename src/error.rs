//! Relay error types with HTTP status code mapping.
//!
//! [`ManagerError`] is the central error type of the crate. Handlers inside
//! the orchestrator return it and the loop logs it; only decode failures
//! travel back to a client, as an `Error` frame. The HTTP status endpoint
//! maps variants to a status code and a structured JSON body.
//!
//! [`BracketError`] describes failed bracket-service calls. It never leaves
//! the bracket worker except as a log line.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::PlayerId;

/// Structured JSON error response body.
///
/// ```json
/// { "error": { "code": 3003, "message": "orchestrator unavailable" } }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Crate-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category            |
/// |-----------|---------------------|
/// | 1000–1999 | Inbound message     |
/// | 2000–2999 | Arena state         |
/// | 3000–3999 | Links and services  |
/// | 4000–4999 | Configuration       |
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// An inbound frame or payload could not be decoded.
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Arena slot ordinal outside the pool.
    #[error("arena slot {0} does not exist")]
    InvalidSlot(usize),

    /// Target arena slot is already occupied.
    #[error("arena slot {0} is occupied")]
    SlotOccupied(usize),

    /// Player already sits in another arena.
    #[error("player {0} is already in an arena")]
    PlayerBusy(PlayerId),

    /// The plugin link is not connected; the send was dropped.
    #[error("plugin link is not connected")]
    PluginDisconnected,

    /// The orchestrator loop is no longer running.
    #[error("orchestrator unavailable")]
    Unavailable,

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ManagerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Decode(_) => 1001,
            Self::InvalidSlot(_) => 2001,
            Self::SlotOccupied(_) => 2002,
            Self::PlayerBusy(_) => 2003,
            Self::PluginDisconnected => 3001,
            Self::Unavailable => 3003,
            Self::InvalidConfig(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSlot(_) => StatusCode::NOT_FOUND,
            Self::SlotOccupied(_) | Self::PlayerBusy(_) => StatusCode::CONFLICT,
            Self::PluginDisconnected | Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ManagerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Failure of a single bracket-service round trip.
#[derive(Debug, thiserror::Error)]
pub enum BracketError {
    /// Connection, TLS or timeout failure.
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for the log.
        body: String,
    },

    /// The body was too short to be a real answer.
    #[error("implausibly short body ({0} bytes)")]
    ShortBody(usize),

    /// The service returned an `errors` payload.
    #[error("service error: {0}")]
    Remote(String),

    /// The body did not have the expected shape.
    #[error("unexpected body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A request URL could not be built from the configured base.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// No tournament was loaded at startup.
    #[error("no tournament loaded")]
    NotLoaded,

    /// A player identity has no registered participant.
    #[error("no participant registered for {0}")]
    UnknownParticipant(PlayerId),

    /// No open match pairs the two participants.
    #[error("no open match between {0} and {1}")]
    MatchNotFound(PlayerId, PlayerId),
}
