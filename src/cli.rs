// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `crossrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "crossrun",
    version,
    about = "Build, install and run actions on local, SSH or device targets.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CROSSRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the config and print the task graph without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[run].concurrency`.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Override `[run].timeout_secs` (0 disables the timeout).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only run the named actions (default: every configured action).
    #[arg(value_name = "ACTION")]
    pub actions: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
