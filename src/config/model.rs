// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::{CrossrunError, Result};
use crate::types::{ModeKind, TargetKind, Variant};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [run]
/// mode = "device"
/// target = "bridge"
/// timeout_secs = 60
/// expectations = ["expectations/known_failures.json"]
///
/// [bridge]
/// serial = "emulator-5554"
///
/// [toolchain]
/// classpath = ["libs/junit.jar"]
///
/// [action.MathTest]
/// target_class = "com.example.MathTest"
/// source = "tests/MathTest.java"
/// ```
///
/// Fields mirror the TOML one-to-one; [`ConfigFile`] is the validated form.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub ssh: Option<SshSection>,

    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub toolchain: ToolchainSection,

    /// All actions from `[action.<name>]`, keyed by action name.
    #[serde(default)]
    pub action: BTreeMap<String, ActionConfig>,
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSection,
    pub ssh: Option<SshSection>,
    pub bridge: BridgeSection,
    pub toolchain: ToolchainSection,
    pub action: BTreeMap<String, ActionConfig>,
}

impl ConfigFile {
    /// Internal constructor used after validation.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            run: raw.run,
            ssh: raw.ssh,
            bridge: raw.bridge,
            toolchain: raw.toolchain,
            action: raw.action,
        }
    }

    /// Effective worker count: the configured bound, or available parallelism.
    pub fn effective_concurrency(&self) -> usize {
        self.run.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// `None` when caching is switched off with `cache_root = ""`.
    pub fn cache_root(&self) -> Option<&PathBuf> {
        if self.run.cache_root.as_os_str().is_empty() {
            None
        } else {
            Some(&self.run.cache_root)
        }
    }
}

/// `[run]` section: how the whole run behaves.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub mode: ModeKind,

    #[serde(default)]
    pub variant: Variant,

    #[serde(default)]
    pub target: TargetKind,

    /// Worker pool size; `None` uses available parallelism.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Per-action wall-clock timeout. `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Factor applied to `timeout_secs` for actions tagged `large`.
    #[serde(default = "default_large_timeout_multiplier")]
    pub large_timeout_multiplier: u32,

    #[serde(default = "default_true")]
    pub clean_before: bool,

    #[serde(default = "default_true")]
    pub clean_after: bool,

    /// Work root on the target.
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,

    /// Host-side scratch directory for build outputs.
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,

    /// Build cache root; an empty path disables the cache.
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,

    /// Build cache entries kept after a run; older ones are deleted.
    #[serde(default = "default_cache_keep")]
    pub cache_keep: usize,

    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Number of historical result files to keep.
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Expectation files, applied in order.
    #[serde(default)]
    pub expectations: Vec<PathBuf>,

    /// Pull `<action dir>/out` back to the host after each execution.
    #[serde(default)]
    pub retrieve: bool,

    #[serde(default)]
    pub debug_port: Option<u16>,

    #[serde(default)]
    pub profile: bool,

    /// Wrapper command placed in front of the VM (e.g. `"strace -f"`).
    #[serde(default)]
    pub invoke_with: Option<String>,

    #[serde(default)]
    pub vm_args: Vec<String>,

    /// Extra arguments passed to every action.
    #[serde(default)]
    pub target_args: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_large_timeout_multiplier() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("/tmp/crossrun")
}

fn default_local_dir() -> PathBuf {
    PathBuf::from(".crossrun/work")
}

fn default_cache_root() -> PathBuf {
    PathBuf::from(".crossrun/cache")
}

fn default_cache_keep() -> usize {
    256
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(".crossrun/results")
}

fn default_retention() -> usize {
    10
}

impl RunSection {
    /// `invoke_with` split into words with shell quoting rules.
    pub fn invoke_with_argv(&self) -> Result<Vec<String>> {
        match self.invoke_with.as_deref() {
            None => Ok(Vec::new()),
            Some(wrapper) => shell_words::split(wrapper).map_err(|e| {
                CrossrunError::ConfigError(format!("[run].invoke_with '{wrapper}': {e}"))
            }),
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            mode: ModeKind::default(),
            variant: Variant::default(),
            target: TargetKind::default(),
            concurrency: None,
            timeout_secs: default_timeout_secs(),
            large_timeout_multiplier: default_large_timeout_multiplier(),
            clean_before: true,
            clean_after: true,
            run_dir: default_run_dir(),
            local_dir: default_local_dir(),
            cache_root: default_cache_root(),
            cache_keep: default_cache_keep(),
            results_dir: default_results_dir(),
            retention: default_retention(),
            expectations: Vec::new(),
            retrieve: false,
            debug_port: None,
            profile: false,
            invoke_with: None,
            vm_args: Vec::new(),
            target_args: Vec::new(),
        }
    }
}

/// `[ssh]` section, required when `run.target = "ssh"`.
#[derive(Debug, Clone, Deserialize)]
pub struct SshSection {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_port() -> u16 {
    22
}

/// `[bridge]` section: the device bridge tool (e.g. `adb`).
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSection {
    #[serde(default = "default_bridge_executable")]
    pub executable: String,

    /// Device serial; `None` lets the bridge pick the only attached device.
    #[serde(default)]
    pub serial: Option<String>,
}

fn default_bridge_executable() -> String {
    "adb".to_string()
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            executable: default_bridge_executable(),
            serial: None,
        }
    }
}

/// `[toolchain]` section: the executables and jars used to build and run.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainSection {
    #[serde(default = "default_compiler")]
    pub compiler: String,

    #[serde(default = "default_archiver")]
    pub archiver: String,

    #[serde(default = "default_dexer")]
    pub dexer: String,

    #[serde(default = "default_java")]
    pub java: String,

    #[serde(default = "default_runtime")]
    pub runtime: String,

    #[serde(default = "default_app_process")]
    pub app_process: String,

    /// Host jars on the compile and runtime classpath.
    #[serde(default)]
    pub classpath: Vec<PathBuf>,

    /// Jar names already present on the device (bootclasspath entries).
    #[serde(default)]
    pub device_boot_classpath: Vec<String>,

    /// Directories scanned for jars when suggesting classpath fixes.
    #[serde(default)]
    pub jar_search_dirs: Vec<PathBuf>,

    #[serde(default = "default_activity_package")]
    pub activity_package: String,

    #[serde(default = "default_activity_class")]
    pub activity_class: String,
}

fn default_compiler() -> String {
    "javac".to_string()
}

fn default_archiver() -> String {
    "jar".to_string()
}

fn default_dexer() -> String {
    "d8".to_string()
}

fn default_java() -> String {
    "java".to_string()
}

fn default_runtime() -> String {
    "dalvikvm".to_string()
}

fn default_app_process() -> String {
    "app_process".to_string()
}

fn default_activity_package() -> String {
    "crossrun.host".to_string()
}

fn default_activity_class() -> String {
    "crossrun.host.ActionActivity".to_string()
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            archiver: default_archiver(),
            dexer: default_dexer(),
            java: default_java(),
            runtime: default_runtime(),
            app_process: default_app_process(),
            classpath: Vec::new(),
            device_boot_classpath: Vec::new(),
            jar_search_dirs: Vec::new(),
            activity_package: default_activity_package(),
            activity_class: default_activity_class(),
        }
    }
}

/// `[action.<name>]` section: one discovered unit of work.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActionConfig {
    /// Fully-qualified entry point, e.g. `com.example.MathTest`.
    #[serde(default)]
    pub target_class: Option<String>,

    /// Source file or source root to compile.
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Directory whose contents are pushed next to the action.
    #[serde(default)]
    pub resource_dir: Option<PathBuf>,

    #[serde(default)]
    pub args: Vec<String>,
}
