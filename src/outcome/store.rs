// src/outcome/store.rs

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::expect::ExpectationStore;

use super::{ActionResult, AnnotatedOutcome, Outcome};

const FILE_PREFIX: &str = "outcomes-";
const FILE_SUFFIX: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StoredResult {
    result: ActionResult,
}

/// Results of one earlier run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricalRun {
    /// Sortable run timestamp taken from the file name.
    pub timestamp: String,
    pub results: BTreeMap<String, ActionResult>,
}

/// Flat-file history: one `outcomes-<timestamp>.json` per run, each a map of
/// name → `{"result": ...}`. Only the newest `retention` files are kept.
#[derive(Debug, Clone)]
pub struct OutcomeStore {
    results_dir: PathBuf,
    retention: usize,
}

impl OutcomeStore {
    pub fn new(results_dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            results_dir: results_dir.into(),
            retention: retention.max(1),
        }
    }

    /// History files, oldest first.
    fn history_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let entries = match fs::read_dir(&self.results_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(timestamp) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            {
                files.push((timestamp.to_string(), entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// The newest `retention` runs, oldest first. Unreadable files are skipped.
    pub fn read(&self) -> Result<Vec<HistoricalRun>> {
        let files = self.history_files()?;
        let skip = files.len().saturating_sub(self.retention);

        let mut runs = Vec::new();
        for (timestamp, path) in files.into_iter().skip(skip) {
            match read_run(&path) {
                Ok(results) => runs.push(HistoricalRun { timestamp, results }),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable history file"),
            }
        }
        debug!(runs = runs.len(), "history loaded");
        Ok(runs)
    }

    /// Pair every outcome with its expectation and its previous results.
    pub fn annotate(
        &self,
        outcomes: Vec<Outcome>,
        expectations: &ExpectationStore,
    ) -> Result<Vec<AnnotatedOutcome>> {
        let history = self.read()?;
        Ok(outcomes
            .into_iter()
            .map(|outcome| {
                let previous = history
                    .iter()
                    .filter_map(|run| {
                        run.results
                            .get(&outcome.name)
                            .map(|r| (run.timestamp.clone(), *r))
                    })
                    .collect();
                let expectation = expectations.get(&outcome).clone();
                AnnotatedOutcome::new(outcome, expectation, previous)
            })
            .collect())
    }

    pub fn write(&self, outcomes: &[Outcome]) -> Result<PathBuf> {
        self.write_at(outcomes, Local::now())
    }

    /// Write this run's results, then delete the oldest files beyond
    /// `retention`.
    pub fn write_at(&self, outcomes: &[Outcome], at: DateTime<Local>) -> Result<PathBuf> {
        fs::create_dir_all(&self.results_dir)?;

        let results: BTreeMap<&str, StoredResult> = outcomes
            .iter()
            .map(|o| (o.name.as_str(), StoredResult { result: o.result }))
            .collect();
        let path = self.results_dir.join(format!(
            "{FILE_PREFIX}{}{FILE_SUFFIX}",
            at.format(TIMESTAMP_FORMAT)
        ));
        fs::write(&path, serde_json::to_string_pretty(&results)?)?;
        info!(path = %path.display(), outcomes = outcomes.len(), "results written");

        self.prune()?;
        Ok(path)
    }

    fn prune(&self) -> Result<()> {
        let files = self.history_files()?;
        let excess = files.len().saturating_sub(self.retention);
        for (_, path) in files.iter().take(excess) {
            debug!(path = %path.display(), "deleting old results");
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }
}

fn read_run(path: &Path) -> Result<BTreeMap<String, ActionResult>> {
    let contents = fs::read_to_string(path)?;
    let stored: BTreeMap<String, StoredResult> = serde_json::from_str(&contents)?;
    Ok(stored.into_iter().map(|(k, v)| (k, v.result)).collect())
}
