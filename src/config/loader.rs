// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{OracleConfig, RawOracleConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawOracleConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawOracleConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawOracleConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load and validate a configuration file.
///
/// Relative classpath elements are resolved against the directory holding
/// the file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<OracleConfig> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = OracleConfig::try_from(raw_config)?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(config.with_base_dir(base_dir))
}

/// Parse and validate TOML text. Relative classpath elements resolve
/// against the current directory.
pub fn from_toml_str(contents: &str) -> Result<OracleConfig> {
    let raw: RawOracleConfig = toml::from_str(contents)?;
    OracleConfig::try_from(raw)
}
