//! Configuration loaded from TOML.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::CrawlOptions;
use crate::error::CrawlError;
use crate::filter::{ExtensionFilter, DEFAULT_EXTENSIONS};
use crate::ftp::{FtpConnector, DEFAULT_FTP_PORT};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub jobs: JobConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.crawl.port == 0 {
            errors.push("crawl.port must be positive".to_string());
        }
        if let Err(e) = ExtensionFilter::new(&self.crawl.extensions) {
            errors.push(format!("crawl.extensions: {e}"));
        }
        if self.jobs.channel_capacity == 0 {
            errors.push("jobs.channel_capacity must be positive".to_string());
        }
        if self.jobs.sweep_interval_secs == 0 {
            errors.push("jobs.sweep_interval_secs must be positive".to_string());
        }
        if self.jobs.heartbeat_ms == 0 {
            errors.push("jobs.heartbeat_ms must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// [crawl]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Port used when the host does not name one.
    #[serde(default = "default_port")]
    pub port: u16,
    /// File extensions to search.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory levels below the root to descend. Unlimited when absent.
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// 0 disables the timeout.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_FTP_PORT
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            extensions: default_extensions(),
            max_depth: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl CrawlConfig {
    pub fn connector(&self) -> FtpConnector {
        let connector = FtpConnector::new().default_port(self.port);
        match self.connect_timeout_secs {
            0 => connector,
            secs => connector.connect_timeout(Duration::from_secs(secs)),
        }
    }

    pub fn options(&self) -> Result<CrawlOptions, CrawlError> {
        Ok(CrawlOptions {
            filter: Arc::new(ExtensionFilter::new(&self.extensions)?),
            max_depth: self.max_depth,
        })
    }
}

// ---------------------------------------------------------------------------
// [jobs]
// ---------------------------------------------------------------------------

/// Job store tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Progress events buffered per job before new ones are dropped.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How long a finished job stays queryable.
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Cadence at which watchers re-check job state.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_ms: u64,
}

fn default_channel_capacity() -> usize {
    100
}

fn default_retention() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

fn default_heartbeat() -> u64 {
    300
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            retention_secs: default_retention(),
            sweep_interval_secs: default_sweep_interval(),
            heartbeat_ms: default_heartbeat(),
        }
    }
}

impl JobConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Log severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// This level made more verbose by `steps` (one per `-v`).
    pub fn raised(self, steps: u8) -> Self {
        const ORDER: [LogLevel; 5] = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ];
        let idx = self as usize + steps as usize;
        ORDER[idx.min(ORDER.len() - 1)]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}
