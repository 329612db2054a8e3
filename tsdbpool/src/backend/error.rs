//! Backend connection errors.

use thiserror::Error;

use super::pool::Address;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("could not resolve \"{0}\"")]
    DnsResolutionFailed(String),

    #[error("connect to {0} timed out")]
    ConnectTimeout(Address),

    #[error("read timeout")]
    ReadTimeout,

    #[error("connection closed")]
    Closed,

    #[error("backend returned {} error(s): {}", .0.len(), .0.join("; "))]
    Backend(Vec<String>),
}
