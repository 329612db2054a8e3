//! Pool slot: one address and at most one connection to it.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::Address;
use crate::backend::Endpoint;

/// Where a slot is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Connected and idle.
    Available,
    /// No connection, waiting to be revived.
    Dead,
    /// Owned by a caller, or being connected or tested.
    Lent,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::Dead => write!(f, "dead"),
            Self::Lent => write!(f, "lent"),
        }
    }
}

#[derive(Debug)]
pub(super) struct Slot {
    pub(super) position: usize,
    pub(super) address: Address,
    /// Only set while the slot is available.
    pub(super) endpoint: Option<Endpoint>,
    pub(super) allocated_at: Instant,
    pub(super) last_tested_at: Instant,
    /// Bumped on every checkout so a lease can't return
    /// a connection it no longer owns.
    pub(super) generation: u64,
    pub(super) state: SlotState,
}

impl Slot {
    pub(super) fn new(position: usize, address: Address, now: Instant) -> Self {
        Self {
            position,
            address,
            endpoint: None,
            allocated_at: now,
            last_tested_at: now,
            generation: 0,
            state: SlotState::Dead,
        }
    }

    /// How long the current connection has been open.
    #[inline]
    pub(super) fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.allocated_at)
    }

    /// How long since the current connection was last tested.
    #[inline]
    pub(super) fn tested_ago(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_tested_at)
    }

    /// Lend the slot out, invalidating older leases.
    #[inline]
    pub(super) fn lend(&mut self) -> u64 {
        self.state = SlotState::Lent;
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    #[inline]
    pub(super) fn lent_to(&self, generation: u64) -> bool {
        self.state == SlotState::Lent && self.generation == generation
    }
}
