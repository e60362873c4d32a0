// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime hands dispatched tasks to an `ExecutorBackend` instead of
//! spawning them itself, so tests can swap in a fake that records what was
//! dispatched and reports completions directly.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskFuture};
use crate::errors::Result;

use super::task_runner::run_task;

/// A dispatched task together with its body.
pub struct RunnableTask {
    pub task: ScheduledTask,
    pub work: TaskFuture,
}

impl fmt::Debug for RunnableTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnableTask")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how dispatched tasks are executed.
///
/// Every task handed over must eventually produce exactly one
/// `RuntimeEvent` on the runtime's channel.
pub trait ExecutorBackend: Send {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<RunnableTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: each body runs on its own Tokio task.
#[derive(Debug, Clone)]
pub struct RealExecutorBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RealExecutorBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { runtime_tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<RunnableTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            for runnable in tasks {
                tokio::spawn(run_task(runnable, tx.clone()));
            }
            Ok(())
        })
    }
}
