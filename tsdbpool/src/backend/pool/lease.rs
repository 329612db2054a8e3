//! Connection lease.

use std::ops::{Deref, DerefMut};

use tracing::debug;

use super::Pool;
use crate::backend::{DisconnectReason, Endpoint};

/// Exclusive use of one pooled connection.
///
/// Give it back with [`Pool::release`], or [`Pool::fault`] if the
/// connection misbehaved. A lease dropped without either is faulted.
pub struct Lease {
    endpoint: Option<Endpoint>,
    position: usize,
    generation: u64,
    pub(super) pool: Pool,
    returned: bool,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("position", &self.position)
            .field("generation", &self.generation)
            .field("connected", &self.endpoint.is_some())
            .finish()
    }
}

impl Lease {
    /// Lease a connection taken from the pool.
    pub(super) fn new(pool: Pool, position: usize, generation: u64, endpoint: Endpoint) -> Self {
        let mut lease = Self::claim(pool, position, generation);
        lease.attach(endpoint);
        lease
    }

    /// Hold a slot that doesn't have a connection yet.
    pub(super) fn claim(pool: Pool, position: usize, generation: u64) -> Self {
        Self {
            endpoint: None,
            position,
            generation,
            pool,
            returned: false,
        }
    }

    /// Give the claimed slot its new connection.
    pub(super) fn attach(&mut self, endpoint: Endpoint) {
        self.endpoint = Some(endpoint);
    }

    /// Hand the slot back to the pool. Only the pool calls this.
    pub(super) fn detach(&mut self) -> (usize, u64, Option<Endpoint>) {
        self.returned = true;
        (self.position, self.generation, self.endpoint.take())
    }

    /// Slot holding this connection.
    pub fn position(&self) -> usize {
        self.position
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Deref for Lease {
    type Target = Endpoint;

    fn deref(&self) -> &Self::Target {
        self.endpoint.as_ref().unwrap()
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.endpoint.as_mut().unwrap()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.returned {
            return;
        }

        debug!(
            "lease dropped without release, faulting slot {} [pool: {}]",
            self.position,
            self.pool.id()
        );

        let (position, generation, endpoint) = self.detach();
        self.pool
            .discard(position, generation, endpoint, DisconnectReason::Dropped);
        self.pool.comms().ready.notify_waiters();
    }
}
