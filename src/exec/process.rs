// src/exec/process.rs

//! External process invocation with a timeout and merged output.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{CrossrunError, Result};

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exit code; `-1` when the process was killed by a signal.
    Exited(i32),
    /// The timeout elapsed and the process was killed.
    TimedOut,
}

/// Status plus the stdout and stderr lines in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub lines: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == ExitStatus::Exited(0)
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// A program invocation: argv, environment, working directory, timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Build from a full argv; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CrossrunError::Target("empty command line".to_string()))?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// `None` waits forever.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Run to completion (or timeout) and collect output.
    ///
    /// Failing to start the program is an error; a non-zero exit is not.
    pub async fn run(&self) -> Result<ProcessOutput> {
        info!(argv = ?self.argv(), cwd = ?self.cwd, "running process");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        // Own process group, so a timeout also reaches whatever a shell
        // script started.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| CrossrunError::Target(format!("failed to start '{}': {e}", self.program)))?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, line_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, line_tx.clone());
        }
        drop(line_tx);

        let status = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => ExitStatus::Exited(status?.code().unwrap_or(-1)),
                    Err(_) => {
                        warn!(program = %self.program, ?limit, "process timed out; killing");
                        if let Some(pid) = child.id() {
                            kill_process_group(pid);
                        }
                        if let Err(e) = child.kill().await {
                            warn!(program = %self.program, error = %e, "failed to kill timed-out process");
                        }
                        ExitStatus::TimedOut
                    }
                }
            }
            None => ExitStatus::Exited(child.wait().await?.code().unwrap_or(-1)),
        };

        let mut lines = Vec::new();
        if status == ExitStatus::TimedOut {
            // Grandchildren may still hold the pipes open.
            while let Ok(line) = line_rx.try_recv() {
                lines.push(line);
            }
        } else {
            while let Some(line) = line_rx.recv().await {
                lines.push(line);
            }
        }

        debug!(program = %self.program, ?status, lines = lines.len(), "process finished");
        Ok(ProcessOutput { status, lines })
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: signalling a process group has no memory-safety preconditions.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

fn spawn_line_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("output: {}", line);
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_stdout_and_stderr() {
        let output = ProcessCommand::new("sh")
            .arg("-c")
            .arg("echo out; echo err 1>&2; exit 3")
            .run()
            .await
            .unwrap();

        assert_eq!(output.status, ExitStatus::Exited(3));
        assert!(!output.success());
        let mut lines = output.lines.clone();
        lines.sort();
        assert_eq!(lines, vec!["err", "out"]);
    }

    #[tokio::test]
    async fn passes_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessCommand::new("sh")
            .args(["-c", "echo $GREETING; pwd"])
            .env("GREETING", "hello")
            .current_dir(dir.path())
            .run()
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.lines[0], "hello");
        let reported = std::fs::canonicalize(&output.lines[1]).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn kills_on_timeout() {
        let output = ProcessCommand::new("sleep")
            .arg("5")
            .timeout(Some(Duration::from_millis(100)))
            .run()
            .await
            .unwrap();
        assert_eq!(output.status, ExitStatus::TimedOut);
    }

    /// Running, as opposed to gone or a zombie awaiting reaping.
    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .ok()
            .and_then(|stat| {
                let state = stat.rsplit_once(')')?.1.trim_start().chars().next()?;
                Some(state != 'Z' && state != 'X')
            })
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_processes_started_by_the_script() {
        let output = ProcessCommand::new("sh")
            .args(["-c", "sleep 30 & echo $!; wait"])
            .timeout(Some(Duration::from_millis(500)))
            .run()
            .await
            .unwrap();
        assert_eq!(output.status, ExitStatus::TimedOut);

        let pid = output.lines[0].trim().to_string();
        let mut alive = true;
        for _ in 0..40 {
            alive = is_running(&pid);
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!alive, "background sleep {pid} survived the timeout");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let err = ProcessCommand::new("definitely-not-a-real-program-xyz")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, CrossrunError::Target(_)));
    }

    #[test]
    fn from_argv_rejects_empty() {
        assert!(ProcessCommand::from_argv(&[]).is_err());
        let cmd = ProcessCommand::from_argv(&["ls".into(), "-l".into()]).unwrap();
        assert_eq!(cmd.argv(), vec!["ls", "-l"]);
    }
}
