//! Arena slot pool with a configurable preference order.
//!
//! [`ArenaAllocator`] owns the fixed set of [`ArenaSlot`]s and the priority
//! list used to pick the next free one. Slots are addressed by 0-based
//! ordinal internally; the wire protocols use 1-based arena numbers, which
//! [`ArenaAllocator::slot_for_arena`] translates.
//!
//! # Invariant
//!
//! A player identity occupies at most one slot at any time. [`assign`]
//! refuses calls that would break this, and [`record`] evicts the
//! identities from their previous slot before writing the new one.
//!
//! [`assign`]: ArenaAllocator::assign
//! [`record`]: ArenaAllocator::record

use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use super::{PendingMatch, PlayerId};
use crate::error::ManagerError;

/// Number of concurrent arenas managed by the relay.
pub const ARENA_COUNT: usize = 16;

/// Default preference order, as 1-based arena numbers.
pub const DEFAULT_PRIORITY: [usize; ARENA_COUNT] =
    [5, 6, 7, 1, 2, 3, 4, 8, 9, 10, 11, 12, 13, 14, 15, 16];

/// Occupancy record of one arena.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArenaSlot {
    occupants: Option<BTreeSet<PlayerId>>,
}

impl ArenaSlot {
    /// Returns `true` if nobody is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupants.is_none()
    }

    /// Returns `true` if the identity is assigned here.
    #[must_use]
    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.occupants.as_ref().is_some_and(|set| set.contains(id))
    }

    /// Returns the assigned identities, if any.
    #[must_use]
    pub fn occupants(&self) -> Option<&BTreeSet<PlayerId>> {
        self.occupants.as_ref()
    }

    fn clear(&mut self) -> bool {
        self.occupants.take().is_some()
    }
}

/// One decision made by an allocation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// 0-based slot ordinal.
    pub slot: usize,
    /// The pairing placed in the slot.
    pub pairing: PendingMatch,
}

impl Assignment {
    /// Returns the 1-based arena number used on the wire.
    #[must_use]
    pub const fn arena_number(&self) -> usize {
        self.slot + 1
    }
}

/// Serializable view of one arena for the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArenaOccupancy {
    /// 1-based arena number.
    pub arena: usize,
    /// Identities currently assigned (empty when free).
    pub players: Vec<String>,
}

/// Fixed pool of arena slots plus the order in which they are handed out.
#[derive(Debug, Clone)]
pub struct ArenaAllocator {
    priority: Vec<usize>,
    slots: Vec<ArenaSlot>,
}

impl ArenaAllocator {
    /// Builds an allocator from a preference list of 1-based arena numbers.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidConfig`] unless `priority` is a
    /// permutation of `1..=ARENA_COUNT`.
    pub fn new(priority: &[usize]) -> Result<Self, ManagerError> {
        if priority.len() != ARENA_COUNT {
            return Err(ManagerError::InvalidConfig(format!(
                "arena priority must list {ARENA_COUNT} arenas, got {}",
                priority.len()
            )));
        }
        let mut seen = BTreeSet::new();
        let mut ordinals = Vec::with_capacity(ARENA_COUNT);
        for &arena in priority {
            if arena == 0 || arena > ARENA_COUNT {
                return Err(ManagerError::InvalidConfig(format!(
                    "arena {arena} outside 1..={ARENA_COUNT}"
                )));
            }
            if !seen.insert(arena) {
                return Err(ManagerError::InvalidConfig(format!(
                    "arena {arena} listed twice in priority"
                )));
            }
            ordinals.push(arena - 1);
        }
        Ok(Self {
            priority: ordinals,
            slots: vec![ArenaSlot::default(); ARENA_COUNT],
        })
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; the pool is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Translates a 1-based wire arena number into a slot ordinal.
    #[must_use]
    pub fn slot_for_arena(&self, arena: i64) -> Option<usize> {
        usize::try_from(arena)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|&slot| slot < self.slots.len())
    }

    /// Returns the first free slot in priority order.
    #[must_use]
    pub fn find_open_slot(&self) -> Option<usize> {
        self.priority
            .iter()
            .copied()
            .find(|&slot| self.slots.get(slot).is_some_and(ArenaSlot::is_empty))
    }

    /// Returns `true` if the identity occupies any slot.
    #[must_use]
    pub fn is_player_busy(&self, id: &PlayerId) -> bool {
        self.slots.iter().any(|slot| slot.has_player(id))
    }

    /// Places two players in a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidSlot`] for an unknown ordinal,
    /// [`ManagerError::SlotOccupied`] if the slot is taken, and
    /// [`ManagerError::PlayerBusy`] if either player already sits in a slot.
    pub fn assign(&mut self, slot: usize, a: PlayerId, b: PlayerId) -> Result<(), ManagerError> {
        let occupied = self
            .slots
            .get(slot)
            .map(|s| !s.is_empty())
            .ok_or(ManagerError::InvalidSlot(slot))?;
        if occupied {
            return Err(ManagerError::SlotOccupied(slot));
        }
        for id in [&a, &b] {
            if self.is_player_busy(id) {
                return Err(ManagerError::PlayerBusy(id.clone()));
            }
        }
        if let Some(target) = self.slots.get_mut(slot) {
            target.occupants = Some(BTreeSet::from([a, b]));
        }
        Ok(())
    }

    /// Overwrites a slot with server-reported occupants.
    ///
    /// The identities are first removed from whichever slot held them.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidSlot`] for an unknown ordinal.
    pub fn record(&mut self, slot: usize, a: PlayerId, b: PlayerId) -> Result<(), ManagerError> {
        if slot >= self.slots.len() {
            return Err(ManagerError::InvalidSlot(slot));
        }
        for other in &mut self.slots {
            if let Some(set) = other.occupants.as_mut() {
                set.remove(&a);
                set.remove(&b);
                if set.is_empty() {
                    other.occupants = None;
                }
            }
        }
        if let Some(target) = self.slots.get_mut(slot) {
            target.occupants = Some(BTreeSet::from([a, b]));
        }
        Ok(())
    }

    /// Clears one slot. Returns `true` if it was occupied.
    pub fn release(&mut self, slot: usize) -> bool {
        self.slots.get_mut(slot).is_some_and(ArenaSlot::clear)
    }

    /// Clears the slot behind a 1-based arena number; out-of-range numbers
    /// are ignored. Returns the slot ordinal when the number was valid.
    pub fn release_arena(&mut self, arena: i64) -> Option<usize> {
        let slot = self.slot_for_arena(arena)?;
        self.release(slot);
        Some(slot)
    }

    /// Clears every slot.
    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    /// Returns the slot record at `slot`.
    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&ArenaSlot> {
        self.slots.get(slot)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Greedy single pass over the bracket's pending pairings.
    ///
    /// Pairings with a busy player are skipped. The pass stops at the first
    /// pairing that finds no free slot, leaving it and everything after it
    /// for the next pass.
    pub fn allocate(&mut self, pending: &[PendingMatch]) -> Vec<Assignment> {
        let mut assignments = Vec::new();
        for pairing in pending {
            if self.is_player_busy(&pairing.player1) || self.is_player_busy(&pairing.player2) {
                continue;
            }
            let Some(slot) = self.find_open_slot() else {
                tracing::info!(assigned = assignments.len(), "no open arenas available");
                break;
            };
            match self.assign(slot, pairing.player1.clone(), pairing.player2.clone()) {
                Ok(()) => assignments.push(Assignment {
                    slot,
                    pairing: pairing.clone(),
                }),
                Err(err) => tracing::warn!(%err, slot, "allocation skipped pairing"),
            }
        }
        assignments
    }

    /// Occupancy of every arena in arena-number order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ArenaOccupancy> {
        self.slots
            .iter()
            .enumerate()
            .map(|(slot, record)| ArenaOccupancy {
                arena: slot + 1,
                players: record
                    .occupants()
                    .map(|set| set.iter().map(ToString::to_string).collect())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

impl Default for ArenaAllocator {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY.iter().map(|arena| arena - 1).collect(),
            slots: vec![ArenaSlot::default(); ARENA_COUNT],
        }
    }
}
