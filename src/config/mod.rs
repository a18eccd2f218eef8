// src/config/mod.rs

//! TOML description of a classpath and its prefixes.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{from_toml_str, load_and_validate, load_from_path};
pub use model::{OptionsSection, OracleConfig, PrefixConfig, RawOracleConfig};
