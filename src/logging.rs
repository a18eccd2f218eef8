// src/logging.rs

//! Logging for `classpath-oracle` using `tracing` + `tracing-subscriber`.
//!
//! Two concerns live here:
//! - [`ScanLogger`], the sink that scans and refreshes report diagnostics to.
//!   Callers inject it; the default [`TracingLogger`] forwards to `tracing`.
//! - [`init_logging`], an optional helper for binaries embedding the oracle.
//!
//! Priority for determining the subscriber level:
//! 1. explicit `LogLevel` argument (if provided)
//! 2. `CLASSPATH_ORACLE_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`

use std::error::Error as StdError;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::fmt;

/// Environment variable consulted by [`init_logging`].
pub const LOG_ENV_VAR: &str = "CLASSPATH_ORACLE_LOG";

/// Sink for diagnostics produced while scanning classpath entries.
///
/// Implementations must not block; the core treats every call as
/// fire-and-forget.
pub trait ScanLogger: Send + Sync {
    fn log(&self, level: Level, message: &str, cause: Option<&(dyn StdError + 'static)>);

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message, None);
    }

    fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message, None);
    }
}

/// [`ScanLogger`] that forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ScanLogger for TracingLogger {
    fn log(&self, level: Level, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        let cause = cause.map(|c| c.to_string());
        match level {
            Level::ERROR => tracing::error!(cause = ?cause, "{message}"),
            Level::WARN => tracing::warn!(cause = ?cause, "{message}"),
            Level::INFO => tracing::info!(cause = ?cause, "{message}"),
            Level::DEBUG => tracing::debug!(cause = ?cause, "{message}"),
            _ => tracing::trace!(cause = ?cause, "{message}"),
        }
    }
}

/// Log level accepted by [`init_logging`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(anyhow!("unknown log level: {other}")),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Initialise global logging subscriber.
///
/// Safe to call once at startup. Logs go to stderr.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let level: Level = match level {
        Some(lvl) => lvl.into(),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|s| s.parse::<LogLevel>().ok())
            .map(Level::from)
            .unwrap_or(Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}
