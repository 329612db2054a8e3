//! Pool internals synchronized with a mutex.

use std::collections::VecDeque;

use tokio::time::Instant;

use super::slot::Slot;
use super::{Address, Config, Error, SlotState};
use crate::backend::Endpoint;

/// Result of popping the most recently returned connection.
#[derive(Debug)]
pub(super) enum Popped {
    /// Connection lived past `max_keep_alive_time`. Its slot is dead now
    /// and the caller should close it.
    Expired(Endpoint),
    /// Connection is lent out to the caller.
    Ready(Checkout),
}

/// A connection taken from the available queue.
#[derive(Debug)]
pub(super) struct Checkout {
    pub(super) position: usize,
    pub(super) generation: u64,
    pub(super) endpoint: Endpoint,
    /// Not tested within `min_test_interval`.
    pub(super) needs_test: bool,
}

/// Dead slot taken for revival.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Revival {
    pub(super) position: usize,
    pub(super) generation: u64,
    pub(super) address: Address,
}

/// Pool internals protected by a mutex.
///
/// Every slot is in exactly one place: the available stack,
/// the dead queue, or lent out.
#[derive(Debug)]
pub(crate) struct Inner {
    slots: Vec<Slot>,
    /// Most recently returned is last.
    available: Vec<usize>,
    /// Oldest failure is first.
    dead: VecDeque<usize>,
    config: Config,
}

impl Inner {
    /// All slots start dead, in the order they are given.
    pub(super) fn new(addresses: &[Address], config: Config, now: Instant) -> Self {
        let slots: Vec<Slot> = addresses
            .iter()
            .enumerate()
            .map(|(position, address)| Slot::new(position, address.clone(), now))
            .collect();

        Self {
            dead: (0..slots.len()).collect(),
            available: Vec::with_capacity(slots.len()),
            slots,
            config,
        }
    }

    /// Pop the most recently returned connection.
    pub(super) fn take_available(&mut self, now: Instant) -> Option<Popped> {
        let position = self.available.pop()?;
        let slot = &mut self.slots[position];

        let Some(endpoint) = slot.endpoint.take() else {
            // Can't happen: available slots always hold a connection.
            slot.state = SlotState::Dead;
            self.dead.push_back(position);
            return self.take_available(now);
        };

        if slot.age(now) >= self.config.max_keep_alive_time {
            slot.state = SlotState::Dead;
            self.dead.push_back(position);
            return Some(Popped::Expired(endpoint));
        }

        let needs_test = slot.tested_ago(now) >= self.config.min_test_interval;
        let generation = slot.lend();

        Some(Popped::Ready(Checkout {
            position,
            generation,
            endpoint,
            needs_test,
        }))
    }

    /// Pop the slot that has been dead the longest.
    pub(super) fn take_dead(&mut self) -> Option<Revival> {
        let position = self.dead.pop_front()?;
        let slot = &mut self.slots[position];
        let generation = slot.lend();

        Some(Revival {
            position,
            generation,
            address: slot.address.clone(),
        })
    }

    /// Connection passed its healthcheck.
    pub(super) fn tested(
        &mut self,
        position: usize,
        generation: u64,
        now: Instant,
    ) -> Result<(), Error> {
        let slot = self.lent_slot(position, generation)?;
        slot.last_tested_at = now;
        Ok(())
    }

    /// Slot has a brand new, tested connection.
    pub(super) fn revived(
        &mut self,
        position: usize,
        generation: u64,
        now: Instant,
    ) -> Result<(), Error> {
        let slot = self.lent_slot(position, generation)?;
        slot.allocated_at = now;
        slot.last_tested_at = now;
        Ok(())
    }

    /// Put the connection back on top of the available stack.
    /// A closed connection sends the slot to the dead queue instead.
    pub(super) fn check_in(
        &mut self,
        position: usize,
        generation: u64,
        endpoint: Endpoint,
    ) -> Result<SlotState, Error> {
        let slot = self.lent_slot(position, generation)?;

        if endpoint.is_closed() {
            slot.state = SlotState::Dead;
            self.dead.push_back(position);
            Ok(SlotState::Dead)
        } else {
            slot.endpoint = Some(endpoint);
            slot.state = SlotState::Available;
            self.available.push(position);
            Ok(SlotState::Available)
        }
    }

    /// Send a lent slot to the back of the dead queue.
    /// Its connection, if any, is the caller's to close.
    pub(super) fn kill(&mut self, position: usize, generation: u64) -> Result<(), Error> {
        let slot = self.lent_slot(position, generation)?;
        slot.state = SlotState::Dead;
        self.dead.push_back(position);
        Ok(())
    }

    /// Add a dead slot for the address. Returns its position.
    pub(super) fn add(&mut self, address: Address, now: Instant) -> usize {
        let position = self.slots.len();
        self.slots.push(Slot::new(position, address, now));
        self.dead.push_back(position);
        position
    }

    fn lent_slot(&mut self, position: usize, generation: u64) -> Result<&mut Slot, Error> {
        match self.slots.get_mut(position) {
            Some(slot) if slot.lent_to(generation) => Ok(slot),
            Some(slot) if slot.state == SlotState::Lent => Err(Error::StaleLease {
                position,
                generation,
            }),
            _ => Err(Error::UntrackedConnCheckin(position)),
        }
    }

    /// Number of slots.
    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.slots.len()
    }

    /// Slots with an idle connection.
    #[inline]
    pub(crate) fn available(&self) -> usize {
        self.available.len()
    }

    /// Slots waiting to be revived.
    #[inline]
    pub(crate) fn dead(&self) -> usize {
        self.dead.len()
    }

    /// Slots checked out, connecting or being tested.
    #[inline]
    pub(crate) fn lent(&self) -> usize {
        self.total() - self.available() - self.dead()
    }

    pub(super) fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    #[cfg(test)]
    pub(super) fn available_order(&self) -> Vec<usize> {
        self.available.iter().rev().copied().collect()
    }

    #[cfg(test)]
    pub(super) fn dead_order(&self) -> Vec<usize> {
        self.dead.iter().copied().collect()
    }

    /// Check that every slot is in exactly one place.
    #[cfg(test)]
    pub(super) fn check(&self) {
        for slot in &self.slots {
            let in_available = self.available.iter().filter(|p| **p == slot.position).count();
            let in_dead = self.dead.iter().filter(|p| **p == slot.position).count();

            match slot.state {
                SlotState::Available => {
                    assert_eq!((in_available, in_dead), (1, 0), "{:?}", slot);
                    assert!(slot.endpoint.is_some(), "{:?}", slot);
                }
                SlotState::Dead => {
                    assert_eq!((in_available, in_dead), (0, 1), "{:?}", slot);
                    assert!(slot.endpoint.is_none(), "{:?}", slot);
                }
                SlotState::Lent => {
                    assert_eq!((in_available, in_dead), (0, 0), "{:?}", slot);
                    assert!(slot.endpoint.is_none(), "{:?}", slot);
                }
            }
        }
        assert_eq!(self.available.len() + self.dead.len() + self.lent(), self.slots.len());
    }
}
