// src/cache/md5_cache.rs

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use md5::{Digest, Md5};
use tracing::{debug, warn};

use crate::errors::Result;

use super::FileCache;

/// Build-artifact cache keyed by the MD5 of the artifact's inputs.
#[derive(Debug, Clone)]
pub struct Md5Cache {
    prefix: String,
    cache: Arc<dyn FileCache>,
}

impl Md5Cache {
    pub fn new(prefix: impl Into<String>, cache: Arc<dyn FileCache>) -> Self {
        Self {
            prefix: prefix.into(),
            cache,
        }
    }

    /// `<prefix>-<md5 of first>-<md5 of second>...`, in the given order.
    ///
    /// Returns `None` when an input is a directory or cannot be read; such
    /// inputs are rebuilt every time.
    pub fn make_key<P: AsRef<Path>>(&self, inputs: &[P]) -> Option<String> {
        let mut key = self.prefix.clone();
        for input in inputs {
            let input = input.as_ref();
            if input.is_dir() {
                debug!(path = %input.display(), "directory input; not cacheable");
                return None;
            }
            match md5_hex(input) {
                Ok(hex) => {
                    key.push('-');
                    key.push_str(&hex);
                }
                Err(e) => {
                    warn!(path = %input.display(), error = %e, "cannot hash input; not cacheable");
                    return None;
                }
            }
        }
        Some(key)
    }

    /// Copy the entry for `key` to `output`. `true` on a hit.
    pub fn get_from_cache(&self, output: &Path, key: &str) -> bool {
        self.cache.get_to(key, output)
    }

    pub fn insert(&self, key: &str, content: &Path) -> Result<()> {
        self.cache.insert(key, content)
    }
}

fn md5_hex(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
