// src/cache/file_cache.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::{CrossrunError, Result};

use super::FileCache;

/// One file per key directly under `root`.
#[derive(Debug, Clone)]
pub struct DiskFileCache {
    root: PathBuf,
}

impl DiskFileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn write_entry(&self, key: &str, content: &Path) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        // The temp file lives in the cache dir so the rename stays on one
        // file system.
        let mut temp = NamedTempFile::new_in(&self.root)?;
        let mut source = fs::File::open(content)?;
        io::copy(&mut source, temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        temp.persist(self.entry_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    /// Keep the `keep` most recently modified entries and delete the rest,
    /// oldest first. Returns the number of deleted entries.
    pub fn prune_oldest(&self, keep: usize) -> Result<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() || is_temp_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, entry.path()));
        }

        if files.len() <= keep {
            return Ok(0);
        }

        files.sort();
        let excess = files.len() - keep;
        for (_, path) in files.iter().take(excess) {
            debug!(path = %path.display(), "pruning cache entry");
            fs::remove_file(path)?;
        }
        info!(removed = excess, kept = keep, "pruned build cache");
        Ok(excess)
    }
}

fn is_temp_name(name: &str) -> bool {
    // `NamedTempFile` names start with `.tmp`.
    name.starts_with(".tmp")
}

impl FileCache for DiskFileCache {
    fn exists(&self, key: &str) -> bool {
        self.entry_path(key).is_file()
    }

    fn get_to(&self, key: &str, dest: &Path) -> bool {
        let entry = self.entry_path(key);
        if !entry.is_file() {
            debug!(key, "cache miss");
            return false;
        }
        let copied = dest
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::copy(&entry, dest));
        match copied {
            Ok(_) => {
                debug!(key, dest = %dest.display(), "cache hit");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed; treating as miss");
                false
            }
        }
    }

    fn insert(&self, key: &str, content: &Path) -> Result<()> {
        self.write_entry(key, content)
            .map_err(|source| CrossrunError::CacheWrite {
                key: key.to_string(),
                source,
            })?;
        debug!(key, "cache insert");
        Ok(())
    }

    fn prune(&self, keep: usize) -> Result<usize> {
        self.prune_oldest(keep)
    }
}

/// Cache that stores nothing; used when `cache_root` is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl FileCache for NullCache {
    fn exists(&self, _key: &str) -> bool {
        false
    }

    fn get_to(&self, _key: &str, _dest: &Path) -> bool {
        false
    }

    fn insert(&self, _key: &str, _content: &Path) -> Result<()> {
        Ok(())
    }

    fn prune(&self, _keep: usize) -> Result<usize> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskFileCache::new(dir.path().join("cache"));
        let src = dir.path().join("classes.dex");
        fs::write(&src, b"dex\n035").unwrap();

        assert!(!cache.exists("dex-1"));
        cache.insert("dex-1", &src).unwrap();
        assert!(cache.exists("dex-1"));

        let out = dir.path().join("out/classes.dex");
        assert!(cache.get_to("dex-1", &out));
        assert_eq!(fs::read(out).unwrap(), b"dex\n035");
    }

    #[test]
    fn missing_source_is_a_cache_write_error_and_leaves_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskFileCache::new(dir.path());
        let err = cache
            .insert("dex-2", &dir.path().join("does-not-exist"))
            .unwrap_err();
        assert!(matches!(err, CrossrunError::CacheWrite { ref key, .. } if key == "dex-2"));
        assert!(err.is_fatal());
        assert!(!cache.exists("dex-2"));

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "temp file was not cleaned up");
    }

    #[test]
    fn prune_keeps_newest_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskFileCache::new(dir.path());
        for i in 0..5 {
            let path = dir.path().join(format!("entry-{i}"));
            fs::write(&path, [i as u8]).unwrap();
            let mtime = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000 + i);
            fs::File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(mtime)
                .unwrap();
        }

        assert_eq!(cache.prune_oldest(2).unwrap(), 3);
        let mut left: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["entry-3", "entry-4"]);
    }

    #[test]
    fn null_cache_never_hits() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a");
        fs::write(&src, b"x").unwrap();
        NullCache.insert("k", &src).unwrap();
        assert!(!NullCache.exists("k"));
        assert!(!NullCache.get_to("k", &dir.path().join("b")));
    }
}
