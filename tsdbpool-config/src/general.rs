use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::util::env_or_default;

/// How connections taken from the idle list are validated
/// before they are handed out.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    /// Send `version` and wait for the banner (default).
    #[default]
    Probe,
    /// Check for unsolicited bytes or a closed socket without
    /// talking to the backend.
    Passive,
}

impl FromStr for Validation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "probe" => Ok(Self::Probe),
            "passive" => Ok(Self::Passive),
            _ => Err(format!("Invalid validation mode: {}", s)),
        }
    }
}

impl std::fmt::Display for Validation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Probe => write!(f, "probe"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

/// Settings that apply to every connection in the pool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct General {
    /// Close connections that have been open for longer than this, healthy or not. Milliseconds.
    ///
    /// _Default:_ `300000`
    #[serde(default = "General::max_keep_alive_time")]
    pub max_keep_alive_time: u64,

    /// Connections tested more recently than this are handed out without a new probe. Milliseconds.
    ///
    /// _Default:_ `60000`
    #[serde(default = "General::min_test_interval")]
    pub min_test_interval: u64,

    /// How long a checkout may wait for a connection before giving up. Milliseconds.
    ///
    /// _Default:_ `10000`
    #[serde(default = "General::max_wait_time")]
    pub max_wait_time: u64,

    /// Maximum amount of time to wait for the backend to answer a probe. Milliseconds.
    ///
    /// _Default:_ `5000`
    #[serde(default = "General::healthcheck_timeout")]
    pub healthcheck_timeout: u64,

    /// Size of the write buffer of each connection, in bytes.
    ///
    /// _Default:_ `8192`
    #[serde(default = "General::client_buffer_size")]
    pub client_buffer_size: usize,

    /// Validation strategy for reused connections.
    ///
    /// _Default:_ `probe`
    #[serde(default = "General::validation")]
    pub validation: Validation,
}

impl Default for General {
    fn default() -> Self {
        Self {
            max_keep_alive_time: Self::max_keep_alive_time(),
            min_test_interval: Self::min_test_interval(),
            max_wait_time: Self::max_wait_time(),
            healthcheck_timeout: Self::healthcheck_timeout(),
            client_buffer_size: Self::client_buffer_size(),
            validation: Self::validation(),
        }
    }
}

impl General {
    fn max_keep_alive_time() -> u64 {
        env_or_default(
            "TSDBPOOL_MAX_KEEP_ALIVE_TIME",
            Duration::from_secs(300).as_millis() as u64,
        )
    }

    fn min_test_interval() -> u64 {
        env_or_default(
            "TSDBPOOL_MIN_TEST_INTERVAL",
            Duration::from_secs(60).as_millis() as u64,
        )
    }

    fn max_wait_time() -> u64 {
        env_or_default("TSDBPOOL_MAX_WAIT_TIME", 10_000)
    }

    fn healthcheck_timeout() -> u64 {
        env_or_default("TSDBPOOL_HEALTHCHECK_TIMEOUT", 5_000)
    }

    fn client_buffer_size() -> usize {
        env_or_default("TSDBPOOL_CLIENT_BUFFER_SIZE", 8192)
    }

    fn validation() -> Validation {
        env_or_default("TSDBPOOL_VALIDATION", Validation::default())
    }

    pub fn max_keep_alive_time_duration(&self) -> Duration {
        Duration::from_millis(self.max_keep_alive_time)
    }

    pub fn min_test_interval_duration(&self) -> Duration {
        Duration::from_millis(self.min_test_interval)
    }

    pub fn max_wait_time_duration(&self) -> Duration {
        Duration::from_millis(self.max_wait_time)
    }

    pub fn healthcheck_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.healthcheck_timeout)
    }
}
