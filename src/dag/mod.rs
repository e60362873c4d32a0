// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`graph`] holds the dependency graph with its two edge kinds and the
//!   pre-run validation (unknown predecessors, cycles).
//! - [`scheduler`] is the pure state machine deciding which tasks are ready,
//!   which are blocked, and when a run is finished.
//! - [`task_info`] provides task metadata and state types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] performs the per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{EdgeKind, ScheduledTask, TaskInfo, TaskRunState};
