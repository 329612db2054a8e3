//! Connection pool errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    #[error("acquire cancelled")]
    Cancelled,

    #[error("checkout timeout")]
    CheckoutTimeout,

    #[error("healthcheck error")]
    HealthcheckError,

    #[error("slot {0} is not checked out")]
    UntrackedConnCheckin(usize),

    #[error("slot {position} was checked out again (generation {generation})")]
    StaleLease { position: usize, generation: u64 },

    #[error("connection belongs to a different pool")]
    ForeignLease,
}
