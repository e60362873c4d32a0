// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
///
/// Tests drive the graph by hand and assert on what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Tasks whose predecessors all resolved in this step.
    pub newly_ready: Vec<TaskName>,
    /// Tasks blocked in this step because a success predecessor did not succeed.
    pub newly_blocked: Vec<TaskName>,
    /// Whether every task of the current run is now terminal.
    pub run_just_finished: bool,
}
