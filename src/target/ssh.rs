// src/target/ssh.rs

//! Target reached over `ssh`, with files moved by `scp`.

use std::path::Path;

use tracing::warn;

use crate::errors::Result;

use super::run_checked;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn script_prefix(&self) -> Vec<String> {
        vec![
            "ssh".to_string(),
            "-p".to_string(),
            self.port.to_string(),
            self.host.clone(),
            "-C".to_string(),
        ]
    }

    pub async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let argv = self.scp(
            local.to_string_lossy().into_owned(),
            format!("{}:{remote}", self.host),
        );
        run_checked(argv, "scp push").await.map(|_| ())
    }

    pub async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        let argv = self.scp(
            format!("{}:{remote}", self.host),
            local.to_string_lossy().into_owned(),
        );
        run_checked(argv, "scp pull").await.map(|_| ())
    }

    /// Port forwarding over ssh is not set up by this target.
    pub fn forward_tcp(&self, port: u16) {
        warn!(host = %self.host, port, "tcp forwarding is not supported over ssh; ignoring");
    }

    fn scp(&self, from: String, to: String) -> Vec<String> {
        vec![
            "scp".to_string(),
            "-P".to_string(),
            self.port.to_string(),
            "-r".to_string(),
            from,
            to,
        ]
    }
}
