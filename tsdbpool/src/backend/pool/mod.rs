//! Manage connections to the backend.

pub mod address;
pub mod backoff;
pub mod comms;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod healthcheck;
pub mod inner;
pub mod lease;
pub mod pool_impl;
pub mod slot;
pub mod state;

pub use address::Address;
pub use backoff::Backoff;
pub(crate) use comms::Comms;
pub use config::{Config, PoolConfig};
pub use diagnostics::Diagnostics;
pub use error::Error;
pub(crate) use healthcheck::Healthcheck;
pub(crate) use inner::Inner;
pub use lease::Lease;
pub use pool_impl::Pool;
pub use slot::SlotState;
pub use state::{SlotInfo, State};

#[cfg(test)]
pub mod test;
