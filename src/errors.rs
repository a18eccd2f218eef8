// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A directory reached through a symlink resolves to one of its own
    /// ancestors. Only raised by on-demand full resolution; passive watching
    /// treats the cycle as already watched.
    #[error("Filesystem cycle detected: {path:?} resolves to ancestor {ancestor:?}")]
    FilesystemCycle { path: PathBuf, ancestor: PathBuf },

    #[error("Archive error in {location}: {source}")]
    Archive {
        location: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OracleError {
    /// True for errors that a caller must surface instead of retrying with
    /// the same configuration.
    pub fn is_cycle(&self) -> bool {
        matches!(self, OracleError::FilesystemCycle { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OracleError>;
