//! Errors reported by the backend.
//!
//! These don't change pool state. Writers can poll them to slow down
//! when the backend is struggling.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::warn;

use super::Address;
use crate::backend::protocol::is_collision;

#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: AtomicUsize,
    collision: AtomicBool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error line sent by the backend.
    pub fn backend_error(&self, addr: &Address, error: &str) {
        warn!("backend returned error: {} [{}]", error, addr);
        self.errors.fetch_add(1, Ordering::Relaxed);

        if is_collision(error) {
            self.collision.store(true, Ordering::Relaxed);
        }
    }

    /// Record a connection that failed its check for any other reason.
    pub fn check_failed(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Get and reset the error count.
    pub fn clear_error_count(&self) -> usize {
        self.errors.swap(0, Ordering::Relaxed)
    }

    /// Get and reset the collision flag.
    pub fn has_collision(&self) -> bool {
        self.collision.swap(false, Ordering::Relaxed)
    }
}
