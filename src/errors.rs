// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrossrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Cycle detected in task graph: {0}")]
    TaskCycle(String),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Target error: {0}")]
    Target(String),

    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("File transfer failed: {0}")]
    Transfer(String),

    #[error("Cache write failed for key '{key}': {source}")]
    CacheWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Expectation error: {0}")]
    Expectation(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CrossrunError {
    /// Infrastructure failures that stop the whole run instead of failing a
    /// single task.
    pub fn is_fatal(&self) -> bool {
        match self {
            CrossrunError::CacheWrite { .. }
            | CrossrunError::TargetUnreachable(_)
            | CrossrunError::Transfer(_)
            | CrossrunError::TaskCycle(_)
            | CrossrunError::UnknownDependency { .. }
            | CrossrunError::DuplicateTask(_) => true,
            // Task bodies use anyhow; a cache write failure may be wrapped.
            CrossrunError::Other(err) => err
                .downcast_ref::<CrossrunError>()
                .is_some_and(CrossrunError::is_fatal),
            _ => false,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CrossrunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_write_is_fatal_even_when_wrapped_in_anyhow() {
        let err = CrossrunError::CacheWrite {
            key: "dex-abc".to_string(),
            source: std::io::Error::other("disk full"),
        };
        let wrapped = CrossrunError::Other(anyhow::Error::from(err));
        assert!(wrapped.is_fatal());
    }

    #[test]
    fn only_infrastructure_target_errors_are_fatal() {
        assert!(!CrossrunError::Target("rm failed".into()).is_fatal());
        assert!(CrossrunError::TargetUnreachable("no device".into()).is_fatal());
        assert!(CrossrunError::Transfer("push a.jar".into()).is_fatal());
    }
}
