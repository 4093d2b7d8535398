//! Arena-plugin link: protocol, state machine and connection task.
//!
//! Exactly one plugin connection exists at a time. While it is down every
//! command is rejected rather than buffered, and the client-id maps learnt
//! from the last roster are forgotten.

pub mod bridge;
pub mod link;
pub mod messages;

pub use bridge::{BridgeNotice, LinkState, PluginBridge};
pub use messages::{PluginCommand, PluginEvent, PluginMessage, PluginPlayer};
