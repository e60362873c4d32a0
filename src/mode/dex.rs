// src/mode/dex.rs

//! Converting jars of class files into dexed jars, through the build cache.

use std::path::Path;

use tracing::{debug, info};

use crate::cache::Md5Cache;
use crate::errors::{CrossrunError, Result};
use crate::exec::ProcessCommand;

#[derive(Debug, Clone)]
pub struct Dexer {
    executable: String,
    cache: Md5Cache,
}

impl Dexer {
    pub fn new(executable: impl Into<String>, cache: Md5Cache) -> Self {
        Self {
            executable: executable.into(),
            cache,
        }
    }

    /// Dex `input` into `output`, reusing a cached result for identical input.
    ///
    /// A failed dexer run is a `Target` error; a failed cache insert is a
    /// fatal `CacheWrite` error.
    pub async fn dex(&self, input: &Path, output: &Path) -> Result<()> {
        let key = self.cache.make_key(&[input]);
        if let Some(key) = &key {
            if self.cache.get_from_cache(output, key) {
                debug!(input = %input.display(), key, "dexed jar from cache");
                return Ok(());
            }
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let result = ProcessCommand::new(self.executable.clone())
            .arg("--output")
            .arg(output.to_string_lossy())
            .arg(input.to_string_lossy())
            .run()
            .await?;
        if !result.success() {
            return Err(CrossrunError::Target(format!(
                "dexing {} failed: {}",
                input.display(),
                result.text()
            )));
        }
        info!(input = %input.display(), output = %output.display(), "dexed");

        if let Some(key) = &key {
            self.cache.insert(key, output)?;
        }
        Ok(())
    }
}
