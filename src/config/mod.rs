// src/config/mod.rs

//! Configuration loading and validation for crossrun.
//!
//! - TOML-backed data model (`model.rs`).
//! - Loading from disk (`loader.rs`).
//! - Semantic checks: mode/target compatibility, bounds (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path};
pub use model::{
    ActionConfig, BridgeSection, ConfigFile, RawConfigFile, RunSection, SshSection,
    ToolchainSection,
};
