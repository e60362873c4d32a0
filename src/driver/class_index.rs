// src/driver/class_index.rs

//! Which jars provide which classes, for suggesting classpath fixes after a
//! compile failure.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::Result;

/// Indexes older than this are rebuilt.
pub const INDEX_TTL_SECS: i64 = 7 * 24 * 60 * 60;

pub const INDEX_FILE_NAME: &str = "class-index.json";

/// Subdirectory of the cache root; keeps the index out of cache pruning.
pub const INDEX_DIR: &str = "index";

static MISSING_CLASS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"symbol:\s+class\s+([\w.$]+)").expect("Invalid regex"));

static MISSING_PACKAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"package\s+([\w.]+)\s+does not exist").expect("Invalid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassIndex {
    created_at: i64,
    search_dirs: Vec<PathBuf>,
    /// Fully-qualified class name → jars.
    classes: BTreeMap<String, BTreeSet<PathBuf>>,
    /// Package name → jars.
    packages: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl ClassIndex {
    /// Scan every `.jar` under `search_dirs`. Unreadable jars are skipped.
    pub fn build(search_dirs: &[PathBuf]) -> Self {
        let mut index = ClassIndex {
            created_at: Utc::now().timestamp(),
            search_dirs: search_dirs.to_vec(),
            ..Default::default()
        };

        for dir in search_dirs {
            for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "jar") {
                    if let Err(e) = index.add_jar(path) {
                        warn!(jar = %path.display(), error = %e, "skipping unreadable jar");
                    }
                }
            }
        }
        info!(
            classes = index.classes.len(),
            packages = index.packages.len(),
            "class index built"
        );
        index
    }

    fn add_jar(&mut self, jar: &Path) -> std::result::Result<(), zip::result::ZipError> {
        let archive = zip::ZipArchive::new(File::open(jar)?)?;
        for entry in archive.file_names() {
            let Some(class_path) = entry.strip_suffix(".class") else {
                continue;
            };
            if class_path.contains('$') {
                continue;
            }
            let class_name = class_path.replace('/', ".");
            if let Some((package, _)) = class_name.rsplit_once('.') {
                self.packages
                    .entry(package.to_string())
                    .or_default()
                    .insert(jar.to_path_buf());
            }
            self.classes
                .entry(class_name)
                .or_default()
                .insert(jar.to_path_buf());
        }
        Ok(())
    }

    /// Reuse the index at `path` when it is fresh and covers the same
    /// directories; otherwise rebuild and save it. Without a path the index
    /// is built in memory only.
    pub fn load_or_build(path: Option<&Path>, search_dirs: &[PathBuf]) -> Self {
        let Some(path) = path else {
            return Self::build(search_dirs);
        };

        match Self::load(path) {
            Ok(index) if index.is_fresh() && index.search_dirs == search_dirs => {
                debug!(path = %path.display(), "class index reused");
                return index;
            }
            Ok(_) => debug!(path = %path.display(), "class index stale"),
            Err(e) => debug!(path = %path.display(), error = %e, "no usable class index"),
        }

        let index = Self::build(search_dirs);
        if let Err(e) = index.save(path) {
            warn!(path = %path.display(), error = %e, "failed to save class index");
        }
        index
    }

    fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    fn is_fresh(&self) -> bool {
        Utc::now().timestamp() - self.created_at < INDEX_TTL_SECS
    }

    /// Jars that may provide a class, by simple or fully-qualified name.
    pub fn jars_for_class(&self, name: &str) -> BTreeSet<PathBuf> {
        if name.contains('.') {
            return self.classes.get(name).cloned().unwrap_or_default();
        }
        let suffix = format!(".{name}");
        self.classes
            .iter()
            .filter(|(class, _)| class.ends_with(&suffix) || class.as_str() == name)
            .flat_map(|(_, jars)| jars.iter().cloned())
            .collect()
    }

    pub fn jars_for_package(&self, name: &str) -> BTreeSet<PathBuf> {
        self.packages.get(name).cloned().unwrap_or_default()
    }

    /// Jars providing the classes and packages the compiler reported missing.
    pub fn suggest(&self, compiler_output: &str) -> BTreeSet<PathBuf> {
        let mut jars = BTreeSet::new();
        for name in missing_classes(compiler_output) {
            jars.extend(self.jars_for_class(&name));
        }
        for name in missing_packages(compiler_output) {
            jars.extend(self.jars_for_package(&name));
        }
        jars
    }
}

pub fn missing_classes(compiler_output: &str) -> BTreeSet<String> {
    MISSING_CLASS_REGEX
        .captures_iter(compiler_output)
        .map(|c| c[1].to_string())
        .collect()
}

pub fn missing_packages(compiler_output: &str) -> BTreeSet<String> {
    MISSING_PACKAGE_REGEX
        .captures_iter(compiler_output)
        .map(|c| c[1].to_string())
        .collect()
}
