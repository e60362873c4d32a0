// src/dag/task_info.rs

//! Task metadata and per-run state.

use crate::engine::TaskName;

/// How strongly a task depends on one of its predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// The predecessor must reach any terminal state first.
    Completion,
    /// The predecessor must succeed; if it fails or is blocked, so is this task.
    Success,
}

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting on predecessors.
    Pending,
    /// Predecessors resolved; queued for a worker.
    Ready,
    /// Handed to the executor.
    Running,
    Succeeded,
    Failed,
    /// A success predecessor did not succeed; the task never starts.
    Blocked,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Blocked
        )
    }
}

/// Public, read-only view of a task's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// Enqueued but no run has picked it up yet.
    NotStarted,
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Blocked,
}

impl TaskRunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskRunState::Succeeded | TaskRunState::Failed | TaskRunState::Blocked
        )
    }
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotStarted,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Ready) => TaskRunState::Ready,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Succeeded) => TaskRunState::Succeeded,
            Some(RunState::Failed) => TaskRunState::Failed,
            Some(RunState::Blocked) => TaskRunState::Blocked,
        }
    }
}

/// Static edges of a task plus its mutable scheduling state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Hard predecessors: must be terminal before this task starts.
    pub after: Vec<TaskName>,
    /// Success predecessors: must have succeeded before this task starts.
    pub after_success: Vec<TaskName>,

    /// `None` until a run includes this task.
    pub run_state: Option<RunState>,

    /// Predecessors that have not reached a terminal state yet.
    pub waiting_on: usize,

    /// Run in which the task reached its terminal state.
    pub finished_in_run: Option<u64>,
}

impl TaskInfo {
    pub fn new(name: TaskName, after: Vec<TaskName>, after_success: Vec<TaskName>) -> Self {
        Self {
            name,
            after,
            after_success,
            run_state: None,
            waiting_on: 0,
            finished_in_run: None,
        }
    }
}

/// A task the scheduler wants a worker to run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub name: TaskName,
    /// All tasks dispatched by the same `run_tasks` call share a `run_id`.
    pub run_id: u64,
}
