// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{CrossrunError, Result};
use crate::types::{ModeKind, TargetKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CrossrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_actions(cfg)?;
    validate_run_section(cfg)?;
    validate_target(cfg)?;
    validate_mode(cfg)?;
    Ok(())
}

fn ensure_has_actions(cfg: &RawConfigFile) -> Result<()> {
    if cfg.action.is_empty() {
        return Err(CrossrunError::ConfigError(
            "config must contain at least one [action.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_run_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.concurrency == Some(0) {
        return Err(CrossrunError::ConfigError(
            "[run].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.run.large_timeout_multiplier == 0 {
        return Err(CrossrunError::ConfigError(
            "[run].large_timeout_multiplier must be >= 1 (got 0)".to_string(),
        ));
    }

    cfg.run.invoke_with_argv()?;

    if cfg.run.retention == 0 {
        return Err(CrossrunError::ConfigError(
            "[run].retention must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_target(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.target == TargetKind::Ssh {
        match cfg.ssh {
            Some(ref ssh) if !ssh.host.trim().is_empty() => {}
            _ => {
                return Err(CrossrunError::ConfigError(
                    "[run].target = \"ssh\" requires an [ssh] section with a host".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn validate_mode(cfg: &RawConfigFile) -> Result<()> {
    let mode = cfg.run.mode;
    let target = cfg.run.target;

    let needs_device = matches!(
        mode,
        ModeKind::Device | ModeKind::AppProcess | ModeKind::Activity
    );
    if needs_device && target == TargetKind::Local {
        return Err(CrossrunError::ConfigError(format!(
            "mode '{mode}' runs on a device and cannot use the local target"
        )));
    }

    if mode == ModeKind::Jvm && target != TargetKind::Local {
        return Err(CrossrunError::ConfigError(format!(
            "mode 'jvm' runs the host JVM and requires the local target (got '{target}')"
        )));
    }

    if mode == ModeKind::Activity {
        if target != TargetKind::Bridge {
            return Err(CrossrunError::ConfigError(
                "mode 'activity' requires the bridge target".to_string(),
            ));
        }
        if !cfg.run.vm_args.is_empty() {
            return Err(CrossrunError::ConfigError(
                "mode 'activity' does not accept vm_args; the host application controls the VM"
                    .to_string(),
            ));
        }
    }

    Ok(())
}
