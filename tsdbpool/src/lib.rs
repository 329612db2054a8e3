//! tsdbpool: a pool of connections to an OpenTSDB-style `put` endpoint.

pub mod backend;
pub mod cli;

use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Setup the logger, so `info!`, `debug!`
/// and other macros actually output something.
///
/// Using try_init and ignoring errors to allow
/// for use in tests (setting up multiple times).
pub fn logger() {
    init_logging(false);
}

/// Setup the logger, optionally emitting JSON lines.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if json {
        let format = fmt::layer().json().with_file(false);
        let _ = tracing_subscriber::registry()
            .with(format)
            .with(filter)
            .try_init();
    } else {
        let format = fmt::layer()
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .with_file(false);
        let _ = tracing_subscriber::registry()
            .with(format)
            .with(filter)
            .try_init();
    }
}
