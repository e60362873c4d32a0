// src/cache/mod.rs

//! Content-addressed build cache.
//!
//! - [`FileCache`]: key → file store with atomic insertion.
//! - [`Md5Cache`]: derives keys from the MD5 of input files and stores build
//!   artifacts (dexed jars) under them.
//!
//! A miss is never an error. Reads that fail degrade to a miss; writes that
//! fail raise [`crate::errors::CrossrunError::CacheWrite`].

use std::path::Path;
use std::sync::Arc;

use crate::errors::Result;

pub mod file_cache;
pub mod md5_cache;

pub use file_cache::{DiskFileCache, NullCache};
pub use md5_cache::Md5Cache;

pub trait FileCache: Send + Sync + std::fmt::Debug {
    fn exists(&self, key: &str) -> bool;

    /// Copy the entry for `key` to `dest`. Returns `false` on a miss or on
    /// any read failure.
    fn get_to(&self, key: &str, dest: &Path) -> bool;

    /// Store the contents of `content` under `key`. Readers never observe a
    /// partially written entry.
    fn insert(&self, key: &str, content: &Path) -> Result<()>;

    /// Drop all but the `keep` newest entries. Returns how many went.
    fn prune(&self, keep: usize) -> Result<usize>;
}

/// Disk cache under `root`, or [`NullCache`] when caching is disabled.
pub fn open(root: Option<&Path>) -> Arc<dyn FileCache> {
    match root {
        Some(root) => Arc::new(DiskFileCache::new(root)),
        None => Arc::new(NullCache),
    }
}
