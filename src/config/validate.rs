// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{OracleConfig, RawOracleConfig};
use crate::errors::{OracleError, Result};

impl TryFrom<RawOracleConfig> for OracleConfig {
    type Error = crate::errors::OracleError;

    fn try_from(raw: RawOracleConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(OracleConfig::new_unchecked(raw.options, raw.classpath, raw.prefixes))
    }
}

fn validate_raw_config(cfg: &RawOracleConfig) -> Result<()> {
    ensure_has_classpath(cfg)?;
    validate_prefix_paths(cfg)?;
    validate_prefix_filters(cfg)?;
    Ok(())
}

fn ensure_has_classpath(cfg: &RawOracleConfig) -> Result<()> {
    if cfg.classpath.is_empty() {
        return Err(OracleError::ConfigError(
            "config must list at least one `classpath` element".to_string(),
        ));
    }
    Ok(())
}

fn validate_prefix_paths(cfg: &RawOracleConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for prefix in &cfg.prefixes {
        let path = prefix.path.as_str();
        if path.starts_with('/') {
            return Err(OracleError::ConfigError(format!(
                "prefix '{}' must be relative (no leading '/')",
                path
            )));
        }
        if path.split('/').any(|segment| segment == "..") {
            return Err(OracleError::ConfigError(format!(
                "prefix '{}' must not contain '..'",
                path
            )));
        }
        let normalised = path.trim_end_matches('/');
        if !seen.insert(normalised) {
            return Err(OracleError::ConfigError(format!(
                "prefix '{}' is listed more than once",
                path
            )));
        }
    }
    Ok(())
}

fn validate_prefix_filters(cfg: &RawOracleConfig) -> Result<()> {
    for prefix in &cfg.prefixes {
        prefix.build_filter().map_err(|err| {
            OracleError::ConfigError(format!("prefix '{}': {}", prefix.path, err))
        })?;
    }
    Ok(())
}
