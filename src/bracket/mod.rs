//! Bracket service synchronisation.
//!
//! [`BracketClient`] speaks the service's HTTP API, [`worker`] runs it off
//! the orchestrator's thread of control, and [`models`] holds the wire
//! records plus the pure pairing and score logic.

pub mod client;
pub mod models;
pub mod worker;

#[cfg(test)]
pub(crate) mod mock;

pub use client::BracketClient;
pub use worker::{BracketJob, BracketQueue, BracketReply};
