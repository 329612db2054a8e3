//! Backend address.
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::net::lookup_host;

use crate::backend::Error;
use tsdbpool_config::Backend;

/// Backend address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Address {
    /// Backend host.
    pub host: String,
    /// Backend port.
    pub port: u16,
}

impl Address {
    pub fn new(host: impl ToString, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// Resolve to a socket address, taking the first result.
    pub async fn addr(&self) -> Result<SocketAddr, Error> {
        let mut socket_addrs = lookup_host((self.host.as_str(), self.port)).await?;

        socket_addrs
            .next()
            .ok_or(Error::DnsResolutionFailed(self.host.clone()))
    }
}

impl From<&Backend> for Address {
    fn from(backend: &Backend) -> Self {
        Self::new(&backend.host, backend.port)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
