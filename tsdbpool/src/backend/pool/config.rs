//! Pool configuration.

use std::time::Duration;

use tsdbpool_config::{General, Validation};

use super::Address;

/// Pool configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// How long a connection can be open.
    pub max_keep_alive_time: Duration,
    /// Don't probe connections tested more recently than this.
    pub min_test_interval: Duration,
    /// How long `get` waits for a connection.
    pub max_wait_time: Duration,
    /// Healthcheck timeout.
    pub healthcheck_timeout: Duration,
    /// How to validate reused connections.
    pub validation: Validation,
}

impl Config {
    /// Create from the general settings.
    pub fn new(general: &General) -> Self {
        Self {
            max_keep_alive_time: general.max_keep_alive_time_duration(),
            min_test_interval: general.min_test_interval_duration(),
            max_wait_time: general.max_wait_time_duration(),
            healthcheck_timeout: general.healthcheck_timeout_duration(),
            validation: general.validation,
        }
    }

    /// Max keep alive time.
    pub fn max_keep_alive_time(&self) -> Duration {
        self.max_keep_alive_time
    }

    /// How long to wait between healthchecks.
    pub fn min_test_interval(&self) -> Duration {
        self.min_test_interval
    }

    /// Checkout timeout.
    pub fn max_wait_time(&self) -> Duration {
        self.max_wait_time
    }

    /// Healthcheck timeout.
    pub fn healthcheck_timeout(&self) -> Duration {
        self.healthcheck_timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_keep_alive_time: Duration::from_secs(300),
            min_test_interval: Duration::from_secs(60),
            max_wait_time: Duration::from_secs(10),
            healthcheck_timeout: Duration::from_secs(5),
            validation: Validation::Probe,
        }
    }
}

/// Everything needed to build a pool: one address per slot,
/// repeated for parallel connections to the same backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub addresses: Vec<Address>,
    pub config: Config,
}

impl PoolConfig {
    pub fn new(config: &tsdbpool_config::Config) -> Self {
        let addresses = config
            .backends
            .iter()
            .flat_map(|backend| {
                std::iter::repeat(Address::from(backend)).take(backend.max_connections)
            })
            .collect();

        Self {
            addresses,
            config: Config::new(&config.general),
        }
    }
}
