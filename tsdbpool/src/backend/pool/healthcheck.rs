//! Healthcheck a connection.

use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::{debug, error};
use tsdbpool_config::Validation;

use super::{Error, Pool};
use crate::backend::{self, Endpoint};

/// Perform a healthcheck on a connection.
pub struct Healthcheck<'a> {
    conn: &'a mut Endpoint,
    pool: &'a Pool,
    validation: Validation,
    healthcheck_timeout: Duration,
}

impl<'a> Healthcheck<'a> {
    /// Check a connection before handing it out again,
    /// the way the pool is configured to.
    pub fn conditional(conn: &'a mut Endpoint, pool: &'a Pool) -> Self {
        let config = pool.config();
        Self {
            conn,
            pool,
            validation: config.validation,
            healthcheck_timeout: config.healthcheck_timeout(),
        }
    }

    /// Send the probe, no matter how the pool is configured.
    pub fn mandatory(conn: &'a mut Endpoint, pool: &'a Pool) -> Self {
        Self {
            validation: Validation::Probe,
            ..Self::conditional(conn, pool)
        }
    }

    /// Run the healthcheck.
    pub async fn healthcheck(&mut self) -> Result<(), Error> {
        let started = Instant::now();

        let result = match self.validation {
            Validation::Probe => {
                match timeout(self.healthcheck_timeout, self.conn.healthcheck()).await {
                    Ok(result) => result,
                    Err(_) => Err(backend::Error::ReadTimeout),
                }
            }
            Validation::Passive => self.conn.check_unsolicited(),
        };

        match result {
            Ok(()) => {
                debug!(
                    "healthcheck passed in {:.3}ms [{}]",
                    started.elapsed().as_secs_f64() * 1000.0,
                    self.conn.addr()
                );
                Ok(())
            }

            Err(backend::Error::Backend(errors)) => {
                for line in &errors {
                    self.pool.diagnostics().backend_error(self.conn.addr(), line);
                }
                Err(Error::HealthcheckError)
            }

            Err(err) => {
                error!("healthcheck error: {} [{}]", err, self.conn.addr());
                self.pool.diagnostics().check_failed();
                Err(Error::HealthcheckError)
            }
        }
    }
}
