//! Runtime configuration from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use remitflow_observability::LogFormat;

use crate::directory_writer::DirectoryWriterConfig;
use crate::retry::RetryPolicy;

pub const BIND_ADDR: &str = "REMITFLOW_BIND_ADDR";
pub const DIRECTORY_QUEUE_CAPACITY: &str = "REMITFLOW_DIRECTORY_QUEUE_CAPACITY";
pub const DIRECTORY_MAX_ATTEMPTS: &str = "REMITFLOW_DIRECTORY_MAX_ATTEMPTS";
pub const DIRECTORY_RETRY_BASE_MS: &str = "REMITFLOW_DIRECTORY_RETRY_BASE_MS";
pub const DIRECTORY_FAILURE_LEDGER: &str = "REMITFLOW_DIRECTORY_FAILURE_LEDGER";
pub const SESSION_IDLE_SECS: &str = "REMITFLOW_SESSION_IDLE_SECS";
pub const LOG_FORMAT: &str = "REMITFLOW_LOG_FORMAT";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 200;
const DEFAULT_FAILURE_LEDGER: usize = 500;
const DEFAULT_SESSION_IDLE_SECS: u64 = 24 * 60 * 60;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}={value} is not a valid socket address")]
    InvalidBindAddr { key: &'static str, value: String },
}

/// A value that was set but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFallback {
    pub key: &'static str,
    pub value: String,
    pub default: String,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub directory_writer: DirectoryWriterConfig,
    /// Imports untouched for this long are dropped.
    pub session_idle: Duration,
    /// Replaced values, for the caller to log once logging is up.
    pub fallbacks: Vec<ConfigFallback>,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys take their default; unparseable
    /// numbers and formats are replaced by the default and listed in
    /// `fallbacks`. Only an unusable bind address is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup(BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr {
                key: BIND_ADDR,
                value: raw_addr.clone(),
            })?;

        let mut fallbacks = Vec::new();
        let fb = &mut fallbacks;
        let queue_capacity =
            parsed(&lookup, fb, DIRECTORY_QUEUE_CAPACITY, DEFAULT_QUEUE_CAPACITY).max(1);
        let ledger_capacity =
            parsed(&lookup, fb, DIRECTORY_FAILURE_LEDGER, DEFAULT_FAILURE_LEDGER).max(1);
        let max_attempts = parsed(&lookup, fb, DIRECTORY_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS).max(1);
        let base_ms = parsed(&lookup, fb, DIRECTORY_RETRY_BASE_MS, DEFAULT_RETRY_BASE_MS);
        let idle_secs = parsed(&lookup, fb, SESSION_IDLE_SECS, DEFAULT_SESSION_IDLE_SECS).max(1);
        let log_format = parsed(&lookup, fb, LOG_FORMAT, LogFormat::default());

        Ok(Self {
            bind_addr,
            log_format,
            directory_writer: DirectoryWriterConfig {
                queue_capacity,
                ledger_capacity,
                retry: RetryPolicy::exponential(
                    max_attempts,
                    Duration::from_millis(base_ms),
                    MAX_RETRY_DELAY,
                ),
                ..DirectoryWriterConfig::default()
            },
            session_idle: Duration::from_secs(idle_secs),
            fallbacks,
        })
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    fallbacks: &mut Vec<ConfigFallback>,
    key: &'static str,
    default: T,
) -> T
where
    T: FromStr + core::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            fallbacks.push(ConfigFallback {
                key,
                value: raw,
                default: format!("{default:?}"),
            });
            default
        }),
    }
}
