//! The line protocol spoken by the backend.
//!
//! Metrics are written as `put <name> <timestamp> <value> [<tag>=<value> ...]\n`.
//! The backend answers `version\n` with its build banner, and reports
//! problems with earlier `put` lines as free-form error lines.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Liveness probe request.
pub const VERSION_REQUEST: &[u8] = b"version\n";

/// First line of the reply to `version`.
pub const BANNER_PREFIX: &str = "net.opentsdb";

/// Second line of the reply to `version`.
pub const BUILT_ON_PREFIX: &str = "Built on ";

// put: HBase error: 1000 RPCs waiting on "tsdb,,1398325180794.54ad8182f2f2a0a1cc6d39ba26ca7f64." to come back online
static COLLISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"HBase error: .* RPCs waiting on .* to come back online").unwrap());

/// A single data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub timestamp: i64,
    pub value: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Metric {
    pub fn new(name: impl ToString, timestamp: i64, value: f64) -> Self {
        Self {
            name: name.to_string(),
            timestamp,
            value,
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.tags.insert(name.to_string(), value.to_string());
        self
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(|s| s.as_str())
    }

    /// Encode as a `put` line.
    pub fn put_message(&self) -> String {
        put_message(&self.name, self.timestamp, self.value, &self.tags)
    }
}

/// Encode a data point as a `put` line, tags sorted by name.
pub fn put_message<K, V>(
    name: &str,
    timestamp: i64,
    value: f64,
    tags: impl IntoIterator<Item = (K, V)>,
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut tags: Vec<(K, V)> = tags.into_iter().collect();
    tags.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

    let mut line = format!("put {} {} {}", name, timestamp, format_value(value));
    for (name, value) in &tags {
        line.push(' ');
        line.push_str(name.as_ref());
        line.push('=');
        line.push_str(value.as_ref());
    }
    line.push('\n');

    line
}

/// Whole numbers keep one decimal place (`0.0`, `42.0`) so the backend
/// stores them as floating point.
fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// The line is part of the `version` banner.
pub fn is_banner(line: &str) -> bool {
    line.starts_with(BANNER_PREFIX) || line.starts_with(BUILT_ON_PREFIX)
}

/// Lines in a backend reply that aren't part of the banner.
pub fn error_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && !is_banner(line))
        .map(String::from)
        .collect()
}

/// The backend is shedding load: too many RPCs queued on one region.
pub fn is_collision(error: &str) -> bool {
    COLLISION.is_match(error)
}
