// src/target/mod.rs

//! Where actions run: the local machine, an SSH host, or a device reached
//! through a bridge tool.
//!
//! All three present the same contract; only file transfer and the script
//! prefix differ. Remote paths are plain strings since they name locations on
//! another machine.

use std::io;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::errors::{CrossrunError, Result};
use crate::exec::{ProcessCommand, ProcessOutput};
use crate::types::TargetKind;

pub mod bridge;
pub mod local;
pub mod script;
pub mod ssh;

pub use bridge::BridgeTarget;
pub use local::LocalTarget;
pub use script::ScriptBuilder;
pub use ssh::SshTarget;

static USER_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"uid=\d+\(([^)]+)\)").expect("Invalid regex")
});

const DEFAULT_USER: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local(LocalTarget),
    Ssh(SshTarget),
    Bridge(BridgeTarget),
}

impl Target {
    pub fn from_config(config: &ConfigFile) -> Result<Self> {
        match config.run.target {
            TargetKind::Local => Ok(Target::Local(LocalTarget)),
            TargetKind::Ssh => {
                let ssh = config.ssh.as_ref().ok_or_else(|| {
                    CrossrunError::ConfigError("target 'ssh' requires an [ssh] section".into())
                })?;
                Ok(Target::Ssh(SshTarget::new(ssh.host.clone(), ssh.port)))
            }
            TargetKind::Bridge => Ok(Target::Bridge(BridgeTarget::new(
                config.bridge.executable.clone(),
                config.bridge.serial.clone(),
            ))),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Local(_) => TargetKind::Local,
            Target::Ssh(_) => TargetKind::Ssh,
            Target::Bridge(_) => TargetKind::Bridge,
        }
    }

    pub fn script_builder(&self) -> ScriptBuilder {
        let prefix = match self {
            Target::Local(t) => t.script_prefix(),
            Target::Ssh(t) => t.script_prefix(),
            Target::Bridge(t) => t.script_prefix(),
        };
        ScriptBuilder::new(prefix)
    }

    /// Run a script on the target. A non-zero exit is reported in the output,
    /// not as an error.
    pub async fn run_script(
        &self,
        script: &ScriptBuilder,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput> {
        ProcessCommand::from_argv(&script.command_line())?
            .timeout(timeout)
            .run()
            .await
    }

    /// File names in `dir`, sorted. Fails with `NotFound` if `dir` is absent.
    pub async fn ls(&self, dir: &str) -> Result<Vec<String>> {
        if let Target::Local(t) = self {
            return t.ls(dir).await;
        }
        let output = self
            .run_script(&self.script_builder().tokens(["ls", dir]), None)
            .await?;
        // Some bridge versions exit 0 even when `ls` fails.
        if output.lines.iter().any(|l| l.contains("No such file")) {
            return Err(CrossrunError::IoError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{dir}: {}", output.text()),
            )));
        }
        if !output.success() {
            return Err(CrossrunError::Target(format!(
                "ls {dir} failed ({:?}): {}",
                output.status,
                output.text()
            )));
        }
        let mut names: Vec<String> = output
            .lines
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        names.sort();
        Ok(names)
    }

    pub async fn mkdirs(&self, dir: &str) -> Result<()> {
        match self {
            Target::Local(t) => t.mkdirs(dir).await,
            _ => self.checked_script(["mkdir", "-p", dir], "mkdirs").await,
        }
    }

    /// Remove a file or directory tree; a missing path is not an error.
    pub async fn rm(&self, path: &str) -> Result<()> {
        match self {
            Target::Local(t) => t.rm(path).await,
            _ => self.checked_script(["rm", "-rf", path], "rm").await,
        }
    }

    /// Copy a file or tree to the target. Any failure aborts the run.
    pub async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        debug!(local = %local.display(), remote, "push");
        let pushed = match self {
            Target::Local(t) => t.push(local, remote).await,
            Target::Ssh(t) => t.push(local, remote).await,
            Target::Bridge(t) => t.push(local, remote).await,
        };
        pushed.map_err(|e| {
            CrossrunError::Transfer(format!("push {} -> {remote}: {e}", local.display()))
        })
    }

    /// Copy a file or tree back from the target. Any failure aborts the run.
    pub async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        debug!(remote, local = %local.display(), "pull");
        let pulled = match self {
            Target::Local(t) => t.pull(remote, local).await,
            Target::Ssh(t) => t.pull(remote, local).await,
            Target::Bridge(t) => t.pull(remote, local).await,
        };
        pulled.map_err(|e| {
            CrossrunError::Transfer(format!("pull {remote} -> {}: {e}", local.display()))
        })
    }

    /// A no-op locally and over ssh.
    pub async fn forward_tcp(&self, port: u16) -> Result<()> {
        match self {
            Target::Local(_) => Ok(()),
            Target::Ssh(t) => {
                t.forward_tcp(port);
                Ok(())
            }
            Target::Bridge(t) => t.forward_tcp(port).await,
        }
    }

    /// User remote processes run as, from `id`; `root` if unparseable.
    pub async fn device_user_name(&self) -> Result<String> {
        let output = self
            .run_script(&self.script_builder().token("id"), None)
            .await?;
        Ok(parse_user_name(&output.text()))
    }

    /// Make `run_dir` exist, wiping it first when `clean_before` is set.
    ///
    /// Failing here means the target cannot be used at all, so the error is
    /// [`CrossrunError::TargetUnreachable`].
    pub async fn prepare(&self, run_dir: &str, clean_before: bool) -> Result<()> {
        self.try_prepare(run_dir, clean_before)
            .await
            .map_err(|e| CrossrunError::TargetUnreachable(format!("{:?} target: {e}", self.kind())))?;
        info!(target = ?self.kind(), run_dir, "target prepared");
        Ok(())
    }

    async fn try_prepare(&self, run_dir: &str, clean_before: bool) -> Result<()> {
        if let Target::Bridge(t) = self {
            t.wait_for_device().await?;
        }
        if clean_before {
            self.rm(run_dir).await?;
        }
        self.mkdirs(run_dir).await
    }

    async fn checked_script<const N: usize>(&self, tokens: [&str; N], what: &str) -> Result<()> {
        run_checked(self.script_builder().tokens(tokens).command_line(), what)
            .await
            .map(|_| ())
    }
}

/// Run `argv` to completion; a non-zero exit is a `Target` error.
pub(crate) async fn run_checked(argv: Vec<String>, what: &str) -> Result<ProcessOutput> {
    let output = ProcessCommand::from_argv(&argv)?.run().await?;
    if output.success() {
        Ok(output)
    } else {
        Err(CrossrunError::Target(format!(
            "{what} failed ({:?}): {}",
            output.status,
            output.text()
        )))
    }
}

pub fn parse_user_name(id_output: &str) -> String {
    USER_NAME_REGEX
        .captures(id_output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_USER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_from_id_output() {
        assert_eq!(
            parse_user_name("uid=2000(shell) gid=2000(shell) groups=1004(input)"),
            "shell"
        );
        assert_eq!(parse_user_name("permission denied"), "root");
    }

    #[tokio::test]
    async fn local_target_runs_scripts_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::Local(LocalTarget);
        let script = target
            .script_builder()
            .working_dir(dir.path().to_string_lossy())
            .env("NAME", "crossrun")
            .tokens(["sh", "-c", "echo $NAME > marker.txt"]);

        let output = target.run_script(&script, None).await.unwrap();
        assert!(output.success());
        let marker = std::fs::read_to_string(dir.path().join("marker.txt")).unwrap();
        assert_eq!(marker.trim(), "crossrun");
    }

    #[tokio::test]
    async fn prepare_cleans_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("run");
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(run_dir.join("stale"), "x").unwrap();

        let target = Target::Local(LocalTarget);
        let run_dir = run_dir.to_string_lossy().into_owned();
        target.prepare(&run_dir, true).await.unwrap();

        assert!(target.ls(&run_dir).await.unwrap().is_empty());
        target.forward_tcp(8000).await.unwrap();
    }

    fn fake_bridge(dir: &Path, body: &str) -> Target {
        let path = dir.join("fake-bridge");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        Target::Bridge(BridgeTarget::new(path.to_string_lossy(), None))
    }

    #[tokio::test]
    async fn ls_reports_missing_directory_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let target = fake_bridge(
            dir.path(),
            "echo \"ls: /data/x: No such file or directory\"; exit 1",
        );
        match target.ls("/data/x").await {
            Err(CrossrunError::IoError(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ls_on_a_broken_transport_is_a_target_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = fake_bridge(dir.path(), "echo \"error: no devices found\"; exit 1");
        assert!(matches!(
            target.ls("/data/x").await,
            Err(CrossrunError::Target(_))
        ));
    }

    #[tokio::test]
    async fn failed_prepare_and_transfers_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let target = fake_bridge(dir.path(), "exit 1");

        let err = target.prepare("/data/run", true).await.unwrap_err();
        assert!(matches!(err, CrossrunError::TargetUnreachable(_)), "{err:?}");
        assert!(err.is_fatal());

        let err = target
            .push(Path::new("/nonexistent/a.jar"), "/data/run/a.jar")
            .await
            .unwrap_err();
        assert!(matches!(err, CrossrunError::Transfer(_)), "{err:?}");
        assert!(err.is_fatal());

        let err = Target::Local(LocalTarget)
            .pull("/nonexistent/out", &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(err.is_fatal(), "{err:?}");
    }

    #[tokio::test]
    async fn device_user_name_of_local_target_is_resolved() {
        let name = Target::Local(LocalTarget).device_user_name().await.unwrap();
        assert!(!name.is_empty());
    }
}
