use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::signal::ctrl_c;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tsdbpool_config::Config;

use crate::backend::{self, pool, Metric, Pool};

/// Pool of connections to an OpenTSDB-style metrics backend.
#[derive(Parser, Debug)]
#[command(name = "", version = concat!("tsdbpool v", env!("CARGO_PKG_VERSION")))]
pub struct Cli {
    /// Path to the configuration file. Default: "tsdbpool.toml"
    #[arg(short, long, default_value = "tsdbpool.toml")]
    pub config: PathBuf,
    /// Log in JSON.
    #[arg(long)]
    pub log_json: bool,
    /// Subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Check configuration file for errors.
    Configcheck,

    /// Write one data point.
    Put {
        /// Metric name.
        name: String,

        /// Value.
        value: f64,

        /// Unix timestamp, in seconds. Default: now.
        #[arg(long)]
        timestamp: Option<i64>,

        /// Tag, as name=value. Can be repeated.
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },

    /// Connect every slot and print the pool state.
    Probe,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] tsdbpool_config::Error),

    #[error("{0}")]
    Pool(#[from] pool::Error),

    #[error("{0}")]
    Backend(#[from] backend::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

fn parse_tag(tag: &str) -> Result<(String, String), String> {
    match tag.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => {
            Ok((name.to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got \"{}\"", tag)),
    }
}

/// Load the configuration and make sure it's usable.
pub fn config_check(path: &Path) -> Result<Config, Error> {
    let config = Config::load(path)?;
    config.check()?;
    Ok(config)
}

/// Cancelled on Ctrl-C.
fn interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if ctrl_c().await.is_ok() {
                warn!("interrupted");
                cancel.cancel();
            }
        }
    });
    cancel
}

/// Run a command.
#[allow(clippy::print_stdout)]
pub async fn run(cli: Cli) -> Result<(), Error> {
    let config = config_check(&cli.config)?;

    match cli.command {
        Commands::Configcheck => {
            println!(
                "{}: {} backend(s), {} slot(s)",
                cli.config.display(),
                config.backends.len(),
                config.slots()
            );
        }

        Commands::Put {
            name,
            value,
            timestamp,
            tags,
        } => {
            let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
            let mut metric = Metric::new(name, timestamp, value);
            for (name, value) in tags {
                metric = metric.with_tag(name, value);
            }
            put(&Pool::from_config(&config), &metric, &interrupt()).await?;
        }

        Commands::Probe => {
            let state = probe(&Pool::from_config(&config), &interrupt()).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }

    Ok(())
}

/// Write one data point, faulting the connection if it fails.
pub async fn put(pool: &Pool, metric: &Metric, cancel: &CancellationToken) -> Result<(), Error> {
    let mut lease = pool.acquire(cancel).await?;

    let result = async {
        lease.put(metric).await?;
        lease.flush().await
    }
    .await;

    match result {
        Ok(()) => {
            info!("sent \"{}\" [{}]", metric.put_message().trim_end(), lease.addr());
            pool.release(lease);
            Ok(())
        }
        Err(err) => {
            pool.fault(lease);
            Err(err.into())
        }
    }
}

/// Check out every slot at once, so each one gets connected and tested.
pub async fn probe(pool: &Pool, cancel: &CancellationToken) -> Result<pool::State, Error> {
    let mut leases = vec![];
    for _ in 0..pool.state().total {
        leases.push(pool.acquire(cancel).await?);
    }

    let state = pool.state();

    for lease in leases {
        pool.release(lease);
    }

    let errors = pool.clear_error_count();
    if errors > 0 {
        warn!("backend reported {} error(s)", errors);
    }
    if pool.has_collision() {
        warn!("backend is overloaded, slow down writes");
    }

    Ok(state)
}
