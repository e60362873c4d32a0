// src/lib.rs

pub mod action;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dag;
pub mod driver;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod expect;
pub mod logging;
pub mod mode;
pub mod outcome;
pub mod report;
pub mod target;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::driver::Driver;
use crate::report::ConsoleSink;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and CLI overrides
/// - target, mode, cache and expectations (inside [`Driver`])
/// - the task queue and its executor
/// - reporting and result history
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    apply_overrides(&mut cfg, &args)?;

    let base_dir = config_root_dir(&config_path);
    debug!(base_dir = %base_dir.display(), "resolving paths against config directory");
    info!(
        mode = %cfg.run.mode,
        target = %cfg.run.target,
        variant = %cfg.run.variant,
        "configuration loaded"
    );

    let driver = Driver::new(cfg, base_dir, &args.actions, Arc::new(ConsoleSink::stdout()))?;
    Ok(driver.execute(args.dry_run).await?)
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            bail!("--concurrency must be >= 1");
        }
        cfg.run.concurrency = Some(concurrency);
    }
    if let Some(timeout) = args.timeout {
        cfg.run.timeout_secs = timeout;
    }
    Ok(())
}

/// Directory relative config paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "configs/Crossrun.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Crossrun.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
