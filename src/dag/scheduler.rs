use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{RunState, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::{CrossrunError, Result};

/// Scheduler holds the task table and the per-run state machine.
///
/// It is responsible for:
/// - rejecting duplicate names, unknown predecessors and cycles
/// - deciding when a task is ready (all predecessors resolved)
/// - recording success / failure of tasks handed to workers
/// - blocking the success-dependents of tasks that did not succeed
///
/// It performs no IO; [`crate::engine::Runtime`] drives it.
#[derive(Debug, Default)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Names must be unique across the scheduler's lifetime.
    pub fn add_task(&mut self, info: TaskInfo) -> Result<()> {
        if self.tasks.contains_key(&info.name) {
            return Err(CrossrunError::DuplicateTask(info.name));
        }
        debug!(task = %info.name, "task added");
        self.tasks.insert(info.name.clone(), info);
        Ok(())
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// Read-only view of the given task's state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// All task names, sorted.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Static metadata of a task.
    pub fn task_info(&self, task: &str) -> Option<&TaskInfo> {
        self.tasks.get(task)
    }

    /// Predecessors of `task` that have not reached a terminal state.
    pub fn unresolved_predecessors(&self, task: &str) -> Vec<TaskName> {
        let Some(info) = self.tasks.get(task) else {
            return Vec::new();
        };
        info.after
            .iter()
            .chain(info.after_success.iter())
            .filter(|dep| {
                !self
                    .tasks
                    .get(dep.as_str())
                    .and_then(|d| d.run_state)
                    .is_some_and(|s| s.is_terminal())
            })
            .cloned()
            .collect()
    }

    /// Whether any task ended in `Failed`. Blocked tasks do not count.
    pub fn has_failed_tasks(&self) -> bool {
        self.tasks
            .values()
            .any(|info| info.run_state == Some(RunState::Failed))
    }

    /// Start a run over every task not run yet.
    ///
    /// Validates the whole graph first; a cycle or unknown predecessor fails
    /// the run before anything starts.
    pub fn start_run(&mut self) -> Result<SchedulerStep> {
        let graph = DagGraph::from_tasks(self.tasks.values());
        graph.validate()?;
        self.graph = graph;

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        debug!(run_id = self.run_counter, "scheduler: starting run");

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let (newly_ready, newly_blocked) = manager.admit_new_tasks();
        let run_just_finished = self.maybe_finish_run();

        Ok(SchedulerStep {
            newly_ready,
            newly_blocked,
            run_just_finished,
        })
    }

    /// A worker picked up a ready task.
    pub fn mark_running(&mut self, task: &str) {
        match self.tasks.get_mut(task) {
            Some(info) if info.run_state == Some(RunState::Ready) => {
                info.run_state = Some(RunState::Running);
            }
            Some(info) => {
                warn!(task = %task, state = ?info.run_state, "mark_running on a task that is not ready");
            }
            None => warn!(task = %task, "mark_running on unknown task; ignoring"),
        }
    }

    /// Handle completion of a running task (production API).
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<TaskName> {
        self.step_completion(task, outcome).newly_ready
    }

    /// Record the outcome of a running task and relax edges to its dependents.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        match self.tasks.get(task).and_then(|info| info.run_state) {
            Some(RunState::Running) | Some(RunState::Ready) => {}
            Some(state) => {
                warn!(task = %task, ?state, "completion for a task that is not running; ignoring");
                return SchedulerStep::default();
            }
            None => {
                warn!(task = %task, "completion for unknown or unstarted task; ignoring");
                return SchedulerStep::default();
            }
        }

        let state = match outcome {
            TaskOutcome::Success => {
                debug!(task = %task, run_id, "task succeeded");
                RunState::Succeeded
            }
            TaskOutcome::Failed => {
                warn!(task = %task, run_id, "task failed; blocking success-dependents");
                RunState::Failed
            }
        };

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let (newly_ready, newly_blocked) = manager.resolve(task, state);
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_ready,
            newly_blocked,
            run_just_finished,
        }
    }

    /// Clear `current_run_id` once every task is terminal.
    ///
    /// Returns `true` if this call transitioned the scheduler to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}
