use serde::{Deserialize, Serialize};

/// One backend instance accepting `put` lines.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Backend {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    ///
    /// _Default:_ `4242`
    #[serde(default = "Backend::port")]
    pub port: u16,
    /// Number of connections the pool may open to this backend.
    ///
    /// _Default:_ `1`
    #[serde(default = "Backend::max_connections")]
    pub max_connections: usize,
}

impl Backend {
    fn port() -> u16 {
        4242
    }

    fn max_connections() -> usize {
        1
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
