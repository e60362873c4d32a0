// src/engine/mod.rs

//! Orchestration engine for crossrun.
//!
//! This module ties together:
//! - the pure DAG scheduler ([`crate::dag::Scheduler`])
//! - a bounded ready queue ([`core`])
//! - the async event loop that hands ready tasks to an executor and feeds
//!   completions back ([`runtime`])
//! - the public task queue API used by the driver ([`task_queue`])

use crate::errors::CrossrunError;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task body for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
}

/// Events flowing into the runtime from executors.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A task body finished (errors and panics arrive as `Failed`).
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    /// A task body hit an infrastructure failure; the run must stop.
    TaskAborted {
        task: TaskName,
        error: CrossrunError,
    },
}

pub mod core;
pub mod runtime;
pub mod task;
pub mod task_queue;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use runtime::Runtime;
pub use task::{Task, TaskFuture};
pub use task_queue::TaskQueue;
