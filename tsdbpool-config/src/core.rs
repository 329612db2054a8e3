use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use super::backends::Backend;
use super::error::Error;
use super::general::General;
use super::networking::Tcp;

/// Configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// General configuration.
    #[serde(default)]
    pub general: General,

    /// TCP settings.
    #[serde(default)]
    pub tcp: Tcp,

    /// Backends.
    #[serde(default)]
    pub backends: Vec<Backend>,
}

impl Config {
    /// Load configuration from disk or use defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let config = match read_to_string(path) {
            Ok(source) => {
                let config = Self::from_toml(&source)?;
                info!("loaded \"{}\"", path.display());
                config
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "\"{}\" doesn't exist, loading defaults instead",
                    path.display()
                );
                Config::default()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        toml::from_str(source).map_err(|err| Error::config(source, err))
    }

    /// Make sure the pool can be built from this configuration.
    pub fn check(&self) -> Result<(), Error> {
        if self.backends.is_empty() {
            return Err(Error::NoBackends);
        }

        for backend in &self.backends {
            if backend.host.trim().is_empty() {
                return Err(Error::EmptyHost(backend.to_string()));
            }

            if backend.max_connections == 0 {
                return Err(Error::NoConnections(backend.to_string()));
            }
        }

        Ok(())
    }

    /// Total number of connections the pool will manage.
    pub fn slots(&self) -> usize {
        self.backends.iter().map(|b| b.max_connections).sum()
    }
}
