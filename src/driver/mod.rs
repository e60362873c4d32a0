// src/driver/mod.rs

//! Turns a validated config into a task graph, runs it and reports.
//!
//! Per action the chain is:
//!
//! ```text
//! prepare target ──▶ prepare X ──┐
//! build X ───────────────────────┼──▶ install X ──▶ run X ──▶ retrieve X ──▶ cleanup X
//! install classpath <jar> ───────┘
//! ```
//!
//! `install`, `run` and `prepare` need their predecessors to succeed;
//! `retrieve` and `cleanup` only need `run` to have finished. `cleanup` also
//! waits for `prepare`, which may still be running when a failed build
//! blocks `run`.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::action::{self, Action};
use crate::cache;
use crate::config::ConfigFile;
use crate::dag::TaskRunState;
use crate::engine::{Task, TaskOutcome, TaskQueue};
use crate::errors::{CrossrunError, Result};
use crate::expect::ExpectationStore;
use crate::mode::Mode;
use crate::outcome::{ActionResult, OutcomeStore, ResultValue};
use crate::report::{self, OutcomeSink, Summary};
use crate::target::Target;

pub mod build;
pub mod class_index;
pub mod run;

pub use class_index::ClassIndex;
pub use run::Run;

pub const PREPARE_TARGET: &str = "prepare target";

/// Previous runs shown per noteworthy outcome.
const MAX_HISTORY: usize = 10;

/// Stage names of one action's chain, in order.
const STAGES: [&str; 6] = ["build", "prepare", "install", "run", "retrieve", "cleanup"];

#[derive(Debug)]
pub struct Driver {
    run: Arc<Run>,
    actions: Vec<Action>,
}

impl Driver {
    /// Resolve every collaborator from `config`. Relative paths are taken
    /// against `base_dir`; `only` restricts the actions run.
    pub fn new(
        config: ConfigFile,
        base_dir: PathBuf,
        only: &[String],
        sink: Arc<dyn OutcomeSink>,
    ) -> Result<Self> {
        let cache_root = config.cache_root().map(|root| base_dir.join(root));
        let cache = cache::open(cache_root.as_deref());
        let target = Arc::new(Target::from_config(&config)?);
        let mode = Arc::new(Mode::new(&config, Arc::clone(&target), Arc::clone(&cache), &base_dir)?);

        let expectation_files: Vec<PathBuf> = config
            .run
            .expectations
            .iter()
            .map(|p| base_dir.join(p))
            .collect();
        let expectations =
            ExpectationStore::parse(&expectation_files, config.run.mode, config.run.variant)?;

        let mut actions = action::discover(&config.action, &base_dir, only);
        if actions.is_empty() {
            return Err(CrossrunError::ConfigError(format!(
                "no configured action matches {only:?}"
            )));
        }
        for action in &mut actions {
            action.assign_user_dir(mode.run_dir());
        }

        let run = Run::new(config, base_dir, target, mode, cache, expectations, sink);
        Ok(Self {
            run: Arc::new(run),
            actions,
        })
    }

    pub fn run(&self) -> &Arc<Run> {
        &self.run
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Workers to use: the configured bound, capped by the mode.
    pub fn concurrency(&self) -> usize {
        self.run
            .config
            .effective_concurrency()
            .min(self.run.mode.kind().max_concurrency())
            .max(1)
    }

    /// Enqueue the whole graph: target preparation, mode installs and one
    /// chain per action.
    pub fn enqueue(&self, queue: &mut TaskQueue) -> Result<()> {
        let mode = Arc::clone(&self.run.mode);
        let prepare = {
            let mode = Arc::clone(&mode);
            Task::new(PREPARE_TARGET, async move {
                mode.prepare_target().await?;
                Ok(TaskOutcome::Success)
            })
        };
        queue.enqueue(prepare)?;
        queue.enqueue_all(
            mode.install_tasks()
                .into_iter()
                .map(|task| task.after_success(PREPARE_TARGET)),
        )?;
        for action in &self.actions {
            queue.enqueue_all(self.action_tasks(action))?;
        }
        Ok(())
    }

    fn action_tasks(&self, action: &Action) -> Vec<Task> {
        let run = &self.run;
        let mode = &run.mode;
        let name = &action.name;
        let mut tasks = Vec::new();

        tasks.push(build::build_task(run, action));

        let prepare = {
            let mode = Arc::clone(mode);
            let dir = mode.action_dir(action);
            Task::new(format!("prepare {name}"), async move {
                mode.target().rm(&dir).await?;
                mode.target().mkdirs(&dir).await?;
                Ok(TaskOutcome::Success)
            })
            .after_success(PREPARE_TARGET)
        };
        tasks.push(prepare);

        for install in mode.install_action_tasks(action, build::artifact_path(run, action)) {
            tasks.push(
                install
                    .after_success(format!("build {name}"))
                    .after_success(format!("prepare {name}"))
                    .after_success_all(mode.install_task_names()),
            );
        }

        let large = run.expectations.get_by_name(name).is_large();
        let recorder = Arc::clone(run);
        tasks.push(
            mode.execute_action_task(action, large, move |outcome| recorder.record(outcome))
                .after_success(format!("install {name}")),
        );

        let mut cleanup_after = vec![format!("prepare {name}"), format!("run {name}")];
        if run.config.run.retrieve {
            tasks.push(self.retrieve_task(action));
            cleanup_after.push(format!("retrieve {name}"));
        }

        for cleanup in mode.cleanup_tasks(action) {
            let cleanup = cleanup_after
                .iter()
                .fold(cleanup, |task, predecessor| task.after(predecessor.clone()));
            tasks.push(cleanup);
        }
        tasks
    }

    /// `retrieve <action>`: pull `<action dir>/out` back, if the action
    /// produced one.
    fn retrieve_task(&self, action: &Action) -> Task {
        let run = Arc::clone(&self.run);
        let name = action.name.clone();
        let remote = format!("{}/out", run.mode.action_dir(action));
        let local = build::action_local_dir(&run, action).join("out");
        let run_task = format!("run {name}");
        let prepare_task = format!("prepare {name}");
        Task::new(format!("retrieve {name}"), async move {
            match run.target.ls(&remote).await {
                Ok(_) => {}
                Err(CrossrunError::IoError(e)) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(TaskOutcome::Success);
                }
                Err(e) => return Err(e),
            }
            run.target.pull(&remote, &local).await?;
            info!(action = %name, local = %local.display(), "retrieved");
            Ok(TaskOutcome::Success)
        })
        .after(run_task)
        .after_success(prepare_task)
    }

    /// Build and run everything, then report. Returns the process exit code.
    pub async fn execute(&self, dry_run: bool) -> Result<i32> {
        let mut queue = TaskQueue::new();
        self.enqueue(&mut queue)?;

        if dry_run {
            let mut out = io::stdout().lock();
            writeln!(out, "crossrun dry-run: {} actions", self.actions.len())?;
            queue.print_tasks(&mut out)?;
            return Ok(0);
        }

        let started = Instant::now();
        let concurrency = self.concurrency();
        info!(
            actions = self.actions.len(),
            concurrency,
            mode = %self.run.mode.kind(),
            "starting run"
        );
        queue.run_tasks(concurrency).await?;

        let mut out = io::stdout().lock();
        if queue.has_failed_tasks() {
            warn!("some tasks failed");
            queue.print_problem_tasks(&mut out)?;
        }
        self.finish(&queue, started, &mut out)
    }

    /// Give every action without outcomes an `ERROR`, classify against
    /// history, print, persist and compute the exit code.
    pub fn finish<W: Write>(&self, queue: &TaskQueue, started: Instant, out: &mut W) -> Result<i32> {
        let run = &self.run;
        for action in &self.actions {
            if run.has_outcome_for(&action.name, action.target_class.as_deref()) {
                continue;
            }
            let reason = first_failed_stage(queue, &action.name)
                .map(|task| format!("{task} failed"))
                .unwrap_or_else(|| "blocked".to_string());
            run.record_result(&action.name, ActionResult::Error, vec![reason]);
        }

        let outcomes = run.outcomes();
        let store = OutcomeStore::new(
            run.resolve(&run.config.run.results_dir),
            run.config.run.retention,
        );
        let annotated = store.annotate(outcomes.clone(), &run.expectations)?;
        report::print_noteworthy(out, &annotated, MAX_HISTORY)?;
        store.write(&outcomes)?;
        if let Err(e) = run.cache.prune(run.config.run.cache_keep) {
            warn!(error = %e, "failed to prune build cache");
        }

        let summary = Summary {
            counters: run.counters(),
            jar_suggestions: run.jar_suggestions(),
            elapsed: started.elapsed(),
        };
        report::print_summary(out, &summary)?;

        let failed = annotated
            .iter()
            .any(|a| a.result_value() == ResultValue::Fail);
        let exit_code = i32::from(failed);
        info!(exit_code, outcomes = outcomes.len(), "run finished");
        Ok(exit_code)
    }
}

/// The first stage of `action`'s chain that ran and failed.
fn first_failed_stage(queue: &TaskQueue, action: &str) -> Option<String> {
    STAGES
        .iter()
        .map(|stage| format!("{stage} {action}"))
        .find(|task| queue.state_of(task) == Some(TaskRunState::Failed))
        .or_else(|| {
            (queue.state_of(PREPARE_TARGET) == Some(TaskRunState::Failed))
                .then(|| PREPARE_TARGET.to_string())
        })
}
