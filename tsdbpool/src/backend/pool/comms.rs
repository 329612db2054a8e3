//! Internal notifications.

use tokio::sync::Notify;

/// Wakes up tasks waiting for a connection.
#[derive(Debug, Default)]
pub(crate) struct Comms {
    /// A connection was returned, faulted or added.
    pub(crate) ready: Notify,
}

impl Comms {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}
