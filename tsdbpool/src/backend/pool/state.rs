//! Pool state snapshot.

use serde::Serialize;
use tokio::time::Instant;

use super::{Pool, SlotState};

/// State of one slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotInfo {
    pub position: usize,
    pub address: String,
    pub state: SlotState,
    /// Age of the idle connection, in milliseconds.
    pub age_ms: Option<u128>,
}

/// Pool state.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    /// Number of slots.
    pub total: usize,
    /// Connected and idle.
    pub available: usize,
    /// Waiting to be revived.
    pub dead: usize,
    /// Checked out.
    pub lent: usize,
    /// Errors reported by the backend since the count was last cleared.
    pub errors: usize,
    pub slots: Vec<SlotInfo>,
}

impl State {
    pub(super) fn get(pool: &Pool) -> Self {
        let now = Instant::now();
        let guard = pool.lock();

        State {
            total: guard.total(),
            available: guard.available(),
            dead: guard.dead(),
            lent: guard.lent(),
            errors: pool.diagnostics().errors(),
            slots: guard
                .slots()
                .map(|slot| SlotInfo {
                    position: slot.position,
                    address: slot.address.to_string(),
                    state: slot.state,
                    age_ms: if slot.state == SlotState::Available {
                        Some(slot.age(now).as_millis())
                    } else {
                        None
                    },
                })
                .collect(),
        }
    }
}
