// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cfg::logger::LoggingConfig;

/// Widest accepted number line. Nine digits keep the numeric domain inside
/// `u32` and the dedup bit array at 10^9 bits (~125 MB).
pub const MAX_DIGITS: u8 = 9;

/// Reasons a parsed configuration can still be unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("digits must be between 1 and {MAX_DIGITS}, got {0}")]
    DigitsOutOfRange(u8),
    #[error("max_connections must be at least 1")]
    NoConnectionSlots,
    #[error("termination keyword must not be empty")]
    EmptyTermination,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Listener settings: bind port and the concurrent-connection cap.
    #[serde(default)]
    pub server: ServerConfig,
    /// Wire-format settings: number width and the shutdown keyword.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Periodic statistics reporting cadence.
    #[serde(default)]
    pub report: ReportConfig,
    /// Destination of the deduplicated number log.
    #[serde(default)]
    pub log: OutputConfig,
    /// Diagnostic logging (tracing) setup; unrelated to the number log.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Hard cap on simultaneously served connections. Further clients are
    /// left in the accept backlog, never refused at the TCP layer.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IngestConfig {
    /// Exact number of decimal digits a number line must have.
    #[serde(default = "default_digits")]
    pub digits: u8,
    /// Exact line that triggers orderly shutdown of the whole server.
    #[serde(default = "default_termination")]
    pub termination: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReportConfig {
    /// Seconds between statistics reports; 0 disables the ticker.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    /// Path of the number log file.
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    /// Append to an existing log instead of truncating it at startup.
    #[serde(default)]
    pub append: bool,
}

fn default_port() -> u16 {
    4000
}

fn default_max_connections() -> usize {
    5
}

fn default_digits() -> u8 {
    9
}

fn default_termination() -> String {
    "terminate".to_string()
}

fn default_interval_secs() -> u64 {
    10
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./numbers.log")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            digits: default_digits(),
            termination: default_termination(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            append: false,
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path).with_context(|| {
            format!("failed to read config file {:?}", path.as_ref())
        })?;
        let cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates invariants the type system cannot carry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.digits == 0 || self.ingest.digits > MAX_DIGITS {
            return Err(ConfigError::DigitsOutOfRange(self.ingest.digits));
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::NoConnectionSlots);
        }
        // An empty keyword would let a bare line break stop the server.
        if self.ingest.termination.is_empty() {
            return Err(ConfigError::EmptyTermination);
        }
        Ok(())
    }
}

impl ReportConfig {
    /// Reporting cadence, or `None` when reporting is disabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}
