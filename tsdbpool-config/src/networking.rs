use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::{env_or_default, human_duration, human_duration_optional};

/// TCP settings for backend connections.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Tcp {
    /// Enable TCP keep-alive probing on pooled connections.
    ///
    /// _Default:_ `true`
    #[serde(default = "Tcp::default_keepalive")]
    keepalive: bool,
    /// `SO_SNDBUF` in bytes. Unset or `0` leaves the system default.
    send_buffer_size: Option<usize>,
    /// `SO_RCVBUF` in bytes. Unset or `0` leaves the system default.
    recv_buffer_size: Option<usize>,
    /// How long to wait for the TCP handshake. Milliseconds.
    ///
    /// _Default:_ `5000`
    #[serde(default = "Tcp::default_connect_timeout")]
    connect_timeout: u64,
    /// How long a read may block waiting for the backend. Milliseconds.
    ///
    /// _Default:_ the healthcheck timeout
    read_timeout: Option<u64>,
}

impl std::fmt::Display for Tcp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "keepalive={} send_buffer_size={} recv_buffer_size={} connect_timeout={} read_timeout={}",
            self.keepalive(),
            buffer_size(self.send_buffer_size()),
            buffer_size(self.recv_buffer_size()),
            human_duration(self.connect_timeout()),
            human_duration_optional(self.read_timeout()),
        )
    }
}

fn buffer_size(size: Option<usize>) -> String {
    size.map(|size| size.to_string())
        .unwrap_or_else(|| "default".into())
}

impl Default for Tcp {
    fn default() -> Self {
        Self {
            keepalive: Self::default_keepalive(),
            send_buffer_size: None,
            recv_buffer_size: None,
            connect_timeout: Self::default_connect_timeout(),
            read_timeout: None,
        }
    }
}

impl Tcp {
    fn default_keepalive() -> bool {
        env_or_default("TSDBPOOL_TCP_KEEPALIVE", true)
    }

    fn default_connect_timeout() -> u64 {
        env_or_default("TSDBPOOL_CONNECT_TIMEOUT", 5_000)
    }

    pub fn keepalive(&self) -> bool {
        self.keepalive
    }

    pub fn send_buffer_size(&self) -> Option<usize> {
        self.send_buffer_size.filter(|size| *size > 0)
    }

    pub fn recv_buffer_size(&self) -> Option<usize> {
        self.recv_buffer_size.filter(|size| *size > 0)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
            .filter(|timeout| *timeout > 0)
            .map(Duration::from_millis)
    }
}
