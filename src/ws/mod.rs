//! Inbound WebSocket layer: game servers and the admin controller.
//!
//! The endpoint at `/ws` accepts any number of connections. Each one is
//! registered with the orchestrator as an unclassified session and tagged
//! once it sends `ServerHello`.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod registry;
