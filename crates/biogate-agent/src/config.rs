//! Agent configuration from the process environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `BIOGATE_DATABASE` | `biogate.db` | SQLite database path |
//! | `BIOGATE_POLL_INTERVAL_MS` | `1000` | poll timer period |
//! | `BIOGATE_EDGE`, `DESKTOP`, `ELECTRON` | unset | any of them `=1` enables polling |
//!
//! Polling only runs on an edge install next to the terminal; a hosted
//! deployment leaves all three flags unset. Terminal settings (address,
//! comm key, unlock time) are not configured here: they live in the
//! settings table and are re-read on every operation.

use biogate_core::{Error, Result, constants::DEFAULT_POLL_INTERVAL_MS};
use biogate_network::LinkConfig;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const ENV_DATABASE: &str = "BIOGATE_DATABASE";
pub const ENV_POLL_INTERVAL_MS: &str = "BIOGATE_POLL_INTERVAL_MS";
pub const ENV_EDGE: &str = "BIOGATE_EDGE";

const EDGE_FLAGS: [&str; 3] = [ENV_EDGE, "DESKTOP", "ELECTRON"];
const DEFAULT_DATABASE: &str = "biogate.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub database_path: String,

    pub poll_interval: Duration,

    /// Whether this process may run the background poller
    pub edge: bool,

    pub link: LinkConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            edge: false,
            link: LinkConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// ```
    /// use biogate_agent::AgentConfig;
    /// use std::time::Duration;
    ///
    /// let config = AgentConfig::from_lookup(|key| match key {
    ///     "BIOGATE_POLL_INTERVAL_MS" => Some("250".to_string()),
    ///     "DESKTOP" => Some("1".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(config.poll_interval, Duration::from_millis(250));
    /// assert!(config.edge);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(ENV_DATABASE)
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| {
                debug!("{ENV_DATABASE} not set, using default: {DEFAULT_DATABASE}");
                DEFAULT_DATABASE.to_string()
            });

        let poll_interval_ms: u64 =
            try_load(&lookup, ENV_POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(Error::Config(format!(
                "{ENV_POLL_INTERVAL_MS} must be greater than zero"
            )));
        }

        let edge = EDGE_FLAGS
            .iter()
            .any(|key| lookup(key).is_some_and(|value| value.trim() == "1"));

        Ok(Self {
            database_path,
            poll_interval: Duration::from_millis(poll_interval_ms),
            edge,
            link: LinkConfig::default(),
        })
    }

    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn edge(mut self, edge: bool) -> Self {
        self.edge = edge;
        self
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => {
            debug!("{key} not set, using default: {default}");
            Ok(default)
        }
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {key} value {raw:?}: {e}"))),
    }
}
