//! Live inbound sessions and their outbound queues.
//!
//! [`SessionRegistry`] is owned by the orchestrator task and never shared,
//! so it needs no locking of its own. Each [`Session`] holds the
//! [`Outbox`] its transport task drains. Operations on unknown connection
//! ids are silently ignored: a socket may close while a message for it is
//! still being handled.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ConnectionId, Outbox};

/// Classification of an inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Connected but has not sent `ServerHello` yet.
    Unclassified,
    /// A game server.
    Server,
    /// The admin controller.
    Admin,
}

/// One registered inbound connection.
#[derive(Debug)]
pub struct Session {
    role: Role,
    outbox: Arc<Outbox>,
}

impl Session {
    /// Returns the connection's classification.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }
}

/// Connection counts by role.
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct SessionCounts {
    /// Connections that have not said hello.
    pub unclassified: usize,
    /// Game servers.
    pub servers: usize,
    /// Admin controllers (0 or 1).
    pub admins: usize,
}

/// Registry of inbound sessions keyed by [`ConnectionId`].
///
/// At most one session carries [`Role::Admin`] at any time.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, Session>,
    admin: Option<ConnectionId>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unclassified session that writes through `outbox`.
    pub fn register(&mut self, id: ConnectionId, outbox: Arc<Outbox>) {
        self.sessions.insert(
            id,
            Session {
                role: Role::Unclassified,
                outbox,
            },
        );
    }

    /// Removes a session. Returns `false` if it was not registered.
    ///
    /// Clears the admin pointer when the admin session goes away.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        if self.admin == Some(id) {
            self.admin = None;
        }
        self.sessions.remove(&id).is_some()
    }

    /// Tags a session. Tagging a new admin demotes the previous admin to
    /// [`Role::Unclassified`]; it stays registered.
    ///
    /// Returns `false` if the session is unknown.
    pub fn classify(&mut self, id: ConnectionId, role: Role) -> bool {
        if !self.sessions.contains_key(&id) {
            return false;
        }
        match role {
            Role::Admin => {
                if let Some(previous) = self.admin.replace(id)
                    && previous != id
                    && let Some(session) = self.sessions.get_mut(&previous)
                {
                    session.role = Role::Unclassified;
                }
            }
            Role::Server | Role::Unclassified => {
                if self.admin == Some(id) {
                    self.admin = None;
                }
            }
        }
        if let Some(session) = self.sessions.get_mut(&id) {
            session.role = role;
        }
        true
    }

    /// Returns the current admin session, if any.
    #[must_use]
    pub const fn admin(&self) -> Option<ConnectionId> {
        self.admin
    }

    /// Returns the role of a session.
    #[must_use]
    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.sessions.get(&id).map(Session::role)
    }

    /// Appends a frame to the session's queue and wakes its writer.
    ///
    /// Returns `false` (and drops the frame) if the session is unknown.
    pub fn enqueue(&self, id: ConnectionId, frame: String) -> bool {
        match self.sessions.get(&id) {
            Some(session) => {
                session.outbox.push(frame);
                true
            }
            None => {
                tracing::debug!(connection_id = %id, "dropping frame for unknown connection");
                false
            }
        }
    }

    /// Returns `true` if the session has queued frames.
    #[must_use]
    pub fn has_pending(&self, id: ConnectionId) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|session| session.outbox.has_pending())
    }

    /// Removes and returns the session's oldest queued frame.
    #[must_use]
    pub fn dequeue_next(&self, id: ConnectionId) -> Option<String> {
        self.sessions.get(&id).and_then(|session| session.outbox.pop())
    }

    /// Enqueues a frame on every [`Role::Server`] session.
    ///
    /// Returns the number of sessions reached.
    pub fn broadcast_to_servers(&self, frame: &str) -> usize {
        let mut reached = 0;
        for session in self.sessions.values() {
            if session.role == Role::Server {
                session.outbox.push(frame.to_string());
                reached += 1;
            }
        }
        reached
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Counts sessions by role.
    #[must_use]
    pub fn counts(&self) -> SessionCounts {
        let mut counts = SessionCounts::default();
        for session in self.sessions.values() {
            match session.role {
                Role::Unclassified => counts.unclassified += 1,
                Role::Server => counts.servers += 1,
                Role::Admin => counts.admins += 1,
            }
        }
        counts
    }
}
