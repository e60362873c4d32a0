// src/target/local.rs

//! Target backed by the local file system and `sh`.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{CrossrunError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTarget;

impl LocalTarget {
    pub fn script_prefix(&self) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string()]
    }

    pub async fn ls(&self, dir: &str) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    pub async fn mkdirs(&self, dir: &str) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }

    pub async fn rm(&self, path: &str) -> Result<()> {
        let meta = match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let removed = if meta.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        match removed {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        copy_tree(local.to_path_buf(), PathBuf::from(remote)).await
    }

    pub async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        copy_tree(PathBuf::from(remote), local.to_path_buf()).await
    }
}

/// Copy a file or a directory tree; the destination names the copy itself.
async fn copy_tree(from: PathBuf, to: PathBuf) -> Result<()> {
    debug!(from = %from.display(), to = %to.display(), "copying");
    tokio::task::spawn_blocking(move || copy_tree_blocking(&from, &to))
        .await
        .map_err(|e| CrossrunError::Target(format!("copy task failed: {e}")))?
}

fn copy_tree_blocking(from: &Path, to: &Path) -> Result<()> {
    if from.is_file() {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to)?;
        return Ok(());
    }

    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| CrossrunError::Target(format!("walking {}: {e}", from.display())))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| CrossrunError::Target(e.to_string()))?;
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
