// src/driver/run.rs

//! Run-scoped state shared by every task of one invocation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::{debug, warn};

use crate::cache::FileCache;
use crate::config::ConfigFile;
use crate::expect::ExpectationStore;
use crate::mode::Mode;
use crate::outcome::{ActionResult, Outcome, ResultValue};
use crate::report::{Counters, OutcomeSink};
use crate::target::Target;

use super::class_index::{ClassIndex, INDEX_DIR, INDEX_FILE_NAME};

/// Everything tasks need, each mutable structure behind its own lock.
pub struct Run {
    pub config: ConfigFile,
    pub base_dir: PathBuf,
    pub target: Arc<Target>,
    pub mode: Arc<Mode>,
    pub cache: Arc<dyn FileCache>,
    pub expectations: ExpectationStore,
    outcomes: Mutex<BTreeMap<String, Outcome>>,
    counters: Mutex<Counters>,
    jar_suggestions: Mutex<BTreeSet<PathBuf>>,
    class_index: OnceLock<ClassIndex>,
    sink: Arc<dyn OutcomeSink>,
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("base_dir", &self.base_dir)
            .field("mode", &self.mode.kind())
            .field("target", &self.target.kind())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Run {
    pub fn new(
        config: ConfigFile,
        base_dir: PathBuf,
        target: Arc<Target>,
        mode: Arc<Mode>,
        cache: Arc<dyn FileCache>,
        expectations: ExpectationStore,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        Self {
            config,
            base_dir,
            target,
            mode,
            cache,
            expectations,
            outcomes: Mutex::new(BTreeMap::new()),
            counters: Mutex::new(Counters::default()),
            jar_suggestions: Mutex::new(BTreeSet::new()),
            class_index: OnceLock::new(),
            sink,
        }
    }

    /// Resolve a config-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Classify `outcome`, count it, stream it to the sink and keep it.
    /// Classify, count, print and store `outcome`. The first outcome with a
    /// given name wins; later ones are logged and dropped so the counters
    /// always match what is written to history.
    pub fn record(&self, outcome: Outcome) {
        let value = self.expectations.get(&outcome).classify(outcome.result);
        let name = outcome.name.clone();
        let line = format!("{} ({value})", outcome.result);
        {
            let mut outcomes = lock(&self.outcomes);
            if let Some(first) = outcomes.get(&name) {
                warn!(
                    outcome = %name,
                    kept = %first.result,
                    dropped = %outcome.result,
                    "outcome reported twice"
                );
                return;
            }
            outcomes.insert(name.clone(), outcome);
        }
        {
            let mut counters = lock(&self.counters);
            match value {
                ResultValue::Ok => counters.successes += 1,
                ResultValue::Fail => counters.failures += 1,
                ResultValue::Warning => counters.warnings += 1,
                ResultValue::Ignore => counters.skipped += 1,
            }
        }
        self.sink.record(&name, &line);
        debug!(outcome = %name, %value, "outcome recorded");
    }

    pub fn record_result(&self, name: &str, result: ActionResult, lines: Vec<String>) {
        self.record(Outcome::new(name, result, lines));
    }

    /// Whether any recorded outcome belongs to `action`: named after it, or
    /// a per-test outcome of its target class.
    pub fn has_outcome_for(&self, action: &str, target_class: Option<&str>) -> bool {
        let outcomes = lock(&self.outcomes);
        outcomes.keys().any(|name| {
            name == action
                || target_class.is_some_and(|class| {
                    name == class
                        || name
                            .strip_prefix(class)
                            .is_some_and(|rest| rest.starts_with('#'))
                })
        })
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        lock(&self.outcomes).values().cloned().collect()
    }

    pub fn counters(&self) -> Counters {
        *lock(&self.counters)
    }

    /// Look up jars for what the compiler reported missing and remember
    /// them for the summary. Blocking: builds the class index on first use.
    pub fn suggest_jars(&self, compiler_output: &str) {
        let index = self.class_index.get_or_init(|| {
            let index_path = self
                .config
                .cache_root()
                .map(|root| self.resolve(root).join(INDEX_DIR).join(INDEX_FILE_NAME));
            let search_dirs: Vec<PathBuf> = self
                .config
                .toolchain
                .jar_search_dirs
                .iter()
                .map(|d| self.resolve(d))
                .collect();
            ClassIndex::load_or_build(index_path.as_deref(), &search_dirs)
        });
        let jars = index.suggest(compiler_output);
        if !jars.is_empty() {
            lock(&self.jar_suggestions).extend(jars);
        }
    }

    pub fn jar_suggestions(&self) -> BTreeSet<PathBuf> {
        lock(&self.jar_suggestions).clone()
    }
}
