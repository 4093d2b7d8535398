//! # arena-relay
//!
//! Tournament relay between game servers, an admin controller, an arena
//! plugin and an external bracket service.
//!
//! Game servers and the admin connect over WebSocket and exchange
//! `{"type", "payload"}` frames. The relay keeps the bracket service in
//! step with match results, hands open pairings to free arenas in a
//! configurable priority order, and tells the arena plugin which players
//! to move where.
//!
//! ## Architecture
//!
//! ```text
//! Game servers / admin (WebSocket /ws)      Arena plugin (WebSocket client)
//!     │                                          │
//!     ├── ws/ (axum connection tasks)            ├── plugin::link
//!     │                                          │
//!     └──────────── Event channel ───────────────┘
//!                        │
//!               service::Orchestrator  ◄── HTTP /health, /status (api/)
//!                        │
//!     ├── ws::registry::SessionRegistry
//!     ├── domain::ArenaAllocator
//!     ├── plugin::PluginBridge
//!     └── bracket::BracketQueue ──► bracket worker ──► bracket service (HTTP)
//! ```
//!
//! All relay state lives on the orchestrator task. Transports only share a
//! per-connection [`domain::Outbox`] with it.

pub mod api;
pub mod app_state;
pub mod bracket;
pub mod config;
pub mod domain;
pub mod error;
pub mod plugin;
pub mod service;
pub mod ws;
