// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable configuration for the daemon.
//!
//! Everything is loaded once at startup and validated before any
//! component starts; a validation failure exits the process non-zero.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("could not determine state directory")]
    NoStateDir,
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backing store connection string (opaque to the control plane).
    pub store_uri: String,
    pub store_database: String,
    pub store_collection: String,

    /// Seconds between poll-loop cycles.
    pub poll_interval: Duration,
    /// Items to process per batch.
    pub batch_size: usize,

    /// Seconds between liveness marker rewrites.
    pub heartbeat_interval: Duration,
    /// Budget for graceful shutdown before the process gives up.
    pub shutdown_timeout: Duration,

    /// Whether the cluster coordinator runs at all.
    pub enable_distributed_control: bool,
    /// Try push notifications first; fall back to polling if unsupported.
    pub enable_push: bool,
    /// Poll interval for the cluster watch fallback.
    pub control_poll_interval: Duration,
    /// Poll interval for the local control file.
    pub control_file_interval: Duration,

    /// Restart budget per supervised component.
    pub max_component_restarts: u32,
    /// Cap on the supervisor's restart backoff.
    pub restart_backoff_max: Duration,

    /// Root directory for markers, control file, and the control socket.
    pub state_dir: PathBuf,
    /// Log filter (tracing-subscriber EnvFilter syntax).
    pub log_filter: String,
}

impl Config {
    /// Load configuration from `DROVER_*` environment variables and
    /// validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self {
            store_uri: require("DROVER_STORE_URI")?,
            store_database: require("DROVER_STORE_DATABASE")?,
            store_collection: require("DROVER_STORE_COLLECTION")?,
            poll_interval: secs("DROVER_POLL_INTERVAL", 5)?,
            batch_size: parse("DROVER_BATCH_SIZE", 100)?,
            heartbeat_interval: secs("DROVER_HEARTBEAT_INTERVAL", 5)?,
            shutdown_timeout: secs("DROVER_SHUTDOWN_TIMEOUT", 30)?,
            enable_distributed_control: flag("DROVER_ENABLE_DISTRIBUTED_CONTROL", true)?,
            enable_push: flag("DROVER_ENABLE_PUSH", true)?,
            control_poll_interval: secs("DROVER_CONTROL_POLL_INTERVAL", 10)?,
            control_file_interval: secs("DROVER_CONTROL_FILE_INTERVAL", 2)?,
            max_component_restarts: parse("DROVER_MAX_COMPONENT_RESTARTS", 10)?,
            restart_backoff_max: secs("DROVER_RESTART_BACKOFF_MAX", 60)?,
            state_dir: state_dir()?,
            log_filter: std::env::var("DROVER_LOG").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size < 1 {
            return Err(ConfigError::InvalidValue {
                var: "DROVER_BATCH_SIZE",
                value: self.batch_size.to_string(),
            });
        }
        for (var, value) in [
            ("DROVER_POLL_INTERVAL", self.poll_interval),
            ("DROVER_SHUTDOWN_TIMEOUT", self.shutdown_timeout),
            ("DROVER_CONTROL_POLL_INTERVAL", self.control_poll_interval),
            ("DROVER_CONTROL_FILE_INTERVAL", self.control_file_interval),
        ] {
            if value < Duration::from_secs(1) {
                return Err(ConfigError::InvalidValue { var, value: format!("{value:?}") });
            }
        }
        Ok(())
    }

    pub fn health_dir(&self) -> PathBuf {
        self.state_dir.join("health")
    }

    pub fn liveness_path(&self) -> PathBuf {
        self.health_dir().join("liveness")
    }

    pub fn readiness_path(&self) -> PathBuf {
        self.health_dir().join("readiness")
    }

    /// Local control file polled for textual commands.
    pub fn control_file_path(&self) -> PathBuf {
        self.state_dir.join("control")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join("droverd.sock")
    }
}

/// Resolve state directory: DROVER_STATE_DIR > XDG_STATE_HOME/drover >
/// ~/.local/state/drover.
fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("DROVER_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("drover"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/drover"))
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(var)),
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(default),
    }
}

fn secs(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    parse(var, default).map(Duration::from_secs)
}

fn flag(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var, value }),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
