//! Domain layer: identities, roster types, arena slots and outbound queues.
//!
//! Everything in here is plain data plus the [`ArenaAllocator`]; none of
//! it knows about sockets, HTTP or the orchestrator loop.

pub mod arena;
pub mod connection_id;
pub mod outbox;
pub mod player;
pub mod player_id;

pub use arena::{ARENA_COUNT, ArenaAllocator, ArenaOccupancy, ArenaSlot, Assignment};
pub use connection_id::ConnectionId;
pub use outbox::Outbox;
pub use player::{DEFAULT_RATING, Entrant, PendingMatch, Player, seed_entrants};
pub use player_id::PlayerId;
