#![allow(dead_code)]

use std::path::{Path, PathBuf};

use crossrun::config::{ActionConfig, ConfigFile, RawConfigFile};
use crossrun::engine::{Task, TaskOutcome};
use crossrun::types::{ModeKind, TargetKind};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn mode(mut self, mode: ModeKind) -> Self {
        self.config.run.mode = mode;
        self
    }

    pub fn target(mut self, target: TargetKind) -> Self {
        self.config.run.target = target;
        self
    }

    /// Put every host and target directory under `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.config.run.run_dir = root.join("run");
        self.config.run.local_dir = root.join("work");
        self.config.run.cache_root = root.join("cache");
        self.config.run.results_dir = root.join("results");
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.run.concurrency = Some(n);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.run.timeout_secs = secs;
        self
    }

    pub fn expectations(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.run.expectations.push(file.into());
        self
    }

    pub fn retrieve(mut self, val: bool) -> Self {
        self.config.run.retrieve = val;
        self
    }

    pub fn compiler(mut self, exe: &Path) -> Self {
        self.config.toolchain.compiler = exe.to_string_lossy().into_owned();
        self
    }

    pub fn archiver(mut self, exe: &Path) -> Self {
        self.config.toolchain.archiver = exe.to_string_lossy().into_owned();
        self
    }

    pub fn java(mut self, exe: &Path) -> Self {
        self.config.toolchain.java = exe.to_string_lossy().into_owned();
        self
    }

    pub fn with_action(mut self, name: &str, action: ActionConfig) -> Self {
        self.config.action.insert(name.to_string(), action);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ActionConfig`.
pub struct ActionConfigBuilder {
    action: ActionConfig,
}

impl ActionConfigBuilder {
    pub fn new(target_class: &str) -> Self {
        Self {
            action: ActionConfig {
                target_class: Some(target_class.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.action.source = Some(path.into());
        self
    }

    pub fn resource_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.action.resource_dir = Some(path.into());
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.action.args.push(arg.to_string());
        self
    }

    pub fn build(self) -> ActionConfig {
        self.action
    }
}

/// A task whose body resolves immediately to `outcome`.
pub fn instant_task(name: &str, outcome: TaskOutcome) -> Task {
    Task::new(name, async move { Ok(outcome) })
}
