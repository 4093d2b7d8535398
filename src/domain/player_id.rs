//! Stable external player identity.
//!
//! [`PlayerId`] is the join key between local state, the plugin roster and
//! the bracket service (where it travels in the participant `misc` field).
//! Game servers supply platform account ids; players learned from the
//! plugin get a synthetic id derived from their plugin client id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix for identities synthesized from plugin client ids.
const CLIENT_PREFIX: &str = "client:";

/// External identifier of a player.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Wraps an external identifier as-is.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the stable identity of a plugin-reported client.
    #[must_use]
    pub fn from_client_id(client_id: i64) -> Self {
        Self(format!("{CLIENT_PREFIX}{client_id}"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
