// src/config/loader.rs

use std::fs;
use std::io;
use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{CrossrunError, Result};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "Crossrun.toml";

/// Parse `path` without semantic checks. A missing file is a config error
/// naming the path rather than a bare I/O error.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            CrossrunError::ConfigError(format!("config file {} does not exist", path.display()))
        }
        _ => CrossrunError::IoError(e),
    })?;
    Ok(toml::from_str(&contents)?)
}

/// Parse and validate. Relative paths inside the file stay relative; the
/// driver resolves them against the config file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}
