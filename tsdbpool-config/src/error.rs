//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(String),

    #[error("no backends configured")]
    NoBackends,

    #[error("backend \"{0}\" has max_connections set to 0")]
    NoConnections(String),

    #[error("backend \"{0}\" has an empty host")]
    EmptyHost(String),
}

impl Error {
    /// Parse error with the offending line, if toml can tell us where it is.
    pub fn config(source: &str, err: toml::de::Error) -> Self {
        let Some(span) = err.span() else {
            return Self::Parse(err.message().to_string());
        };

        let before = &source[..span.start.min(source.len())];
        let line = before.matches('\n').count() + 1;
        let column = before.len() - before.rfind('\n').map(|n| n + 1).unwrap_or(0) + 1;
        let snippet = source.lines().nth(line - 1).unwrap_or_default().trim();

        Self::Parse(format!(
            "{} at line {}, column {}: \"{}\"",
            err.message(),
            line,
            column,
            snippet
        ))
    }
}
