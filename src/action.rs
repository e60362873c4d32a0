// src/action.rs

//! Discovered units of work.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ActionConfig;

/// A named unit of work: something to compile and run once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    /// Entry point, e.g. `com.example.MathTest`.
    pub target_class: Option<String>,
    pub source: Option<PathBuf>,
    pub resource_dir: Option<PathBuf>,
    pub args: Vec<String>,
    /// Private working directory on the target, assigned when the run starts.
    user_dir: Option<String>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_class: None,
            source: None,
            resource_dir: None,
            args: Vec::new(),
            user_dir: None,
        }
    }

    pub fn from_config(name: &str, config: &ActionConfig, base_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            target_class: config.target_class.clone(),
            source: config.source.as_ref().map(|p| base_dir.join(p)),
            resource_dir: config.resource_dir.as_ref().map(|p| base_dir.join(p)),
            args: config.args.clone(),
            user_dir: None,
        }
    }

    pub fn with_target_class(mut self, class: impl Into<String>) -> Self {
        self.target_class = Some(class.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// `<run_dir>/<name>`.
    pub fn assign_user_dir(&mut self, run_dir: &str) {
        self.user_dir = Some(format!("{}/{}", run_dir.trim_end_matches('/'), self.name));
    }

    pub fn user_dir(&self) -> Option<&str> {
        self.user_dir.as_deref()
    }

    /// Name of the jar built for this action.
    pub fn jar_name(&self) -> String {
        format!("{}.jar", self.name)
    }
}

/// Actions from `[action.<name>]` tables, optionally filtered by name.
///
/// Names are unique by construction (TOML table keys).
pub fn discover(
    configs: &BTreeMap<String, ActionConfig>,
    base_dir: &Path,
    only: &[String],
) -> Vec<Action> {
    configs
        .iter()
        .filter(|(name, _)| only.is_empty() || only.iter().any(|o| o == *name))
        .map(|(name, config)| Action::from_config(name, config, base_dir))
        .collect()
}
