// src/target/bridge.rs

//! Target reached through a device bridge tool (`adb` by default).

use std::path::Path;

use tracing::info;

use crate::errors::Result;

use super::run_checked;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTarget {
    pub executable: String,
    pub serial: Option<String>,
}

impl BridgeTarget {
    pub fn new(executable: impl Into<String>, serial: Option<String>) -> Self {
        Self {
            executable: executable.into(),
            serial,
        }
    }

    /// `adb [-s <serial>]`
    fn base(&self) -> Vec<String> {
        let mut argv = vec![self.executable.clone()];
        if let Some(serial) = &self.serial {
            argv.push("-s".to_string());
            argv.push(serial.clone());
        }
        argv
    }

    fn with(&self, args: &[&str]) -> Vec<String> {
        let mut argv = self.base();
        argv.extend(args.iter().map(|a| a.to_string()));
        argv
    }

    pub fn script_prefix(&self) -> Vec<String> {
        self.with(&["shell"])
    }

    pub async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_string_lossy();
        run_checked(self.with(&["push", &local, remote]), "bridge push")
            .await
            .map(|_| ())
    }

    pub async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        let local = local.to_string_lossy();
        run_checked(self.with(&["pull", remote, &local]), "bridge pull")
            .await
            .map(|_| ())
    }

    pub async fn forward_tcp(&self, port: u16) -> Result<()> {
        let spec = format!("tcp:{port}");
        run_checked(self.with(&["forward", &spec, &spec]), "bridge forward")
            .await
            .map(|_| ())
    }

    pub async fn wait_for_device(&self) -> Result<()> {
        info!(serial = ?self.serial, "waiting for device");
        run_checked(self.with(&["wait-for-device"]), "bridge wait-for-device")
            .await
            .map(|_| ())
    }
}
