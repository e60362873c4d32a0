// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::{CrossrunError, Result};
use crate::exec::{ExecutorBackend, RunnableTask};

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent, TaskFuture, TaskName};

/// Drives the scheduler in response to `RuntimeEvent`s and delegates task
/// bodies to an `ExecutorBackend`.
///
/// All scheduling semantics live in [`CoreRuntime`]; this shell reads events
/// from the channel and pairs dispatched task names with their bodies.
pub struct Runtime<'a, E: ExecutorBackend> {
    core: CoreRuntime<'a>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    work: HashMap<TaskName, TaskFuture>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("pending_bodies", &self.work.len())
            .finish_non_exhaustive()
    }
}

impl<'a, E: ExecutorBackend> Runtime<'a, E> {
    pub fn new(
        core: CoreRuntime<'a>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        work: HashMap<TaskName, TaskFuture>,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            work,
        }
    }

    /// Main event loop. Returns once no task is ready or in flight.
    ///
    /// Bodies of tasks that never became ready (blocked tasks) are returned
    /// to the caller unpolled.
    pub async fn run(mut self) -> Result<HashMap<TaskName, TaskFuture>> {
        let step = self.core.start()?;
        for command in step.commands {
            self.execute_command(command).await?;
        }
        if !step.keep_running {
            return Ok(self.work);
        }

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    warn!("runtime event channel closed with tasks in flight");
                    return Err(CrossrunError::Other(anyhow::anyhow!(
                        "executor went away with {} task(s) in flight",
                        self.core.in_flight()
                    )));
                }
            };

            debug!(?event, "runtime received event");

            let fatal = match event {
                RuntimeEvent::TaskAborted { task, error } => {
                    error!(task = %task, error = %error, "infrastructure failure; aborting run");
                    self.core.step(RuntimeEvent::TaskAborted {
                        task,
                        error: CrossrunError::Other(anyhow::anyhow!("aborted")),
                    });
                    Some(error)
                }
                other => {
                    let step = self.core.step(other);
                    for command in step.commands {
                        self.execute_command(command).await?;
                    }
                    if !step.keep_running {
                        break;
                    }
                    None
                }
            };

            if let Some(error) = fatal {
                return Err(error);
            }
        }

        info!("task run finished");
        Ok(self.work)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await,
        }
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let mut runnable = Vec::with_capacity(tasks.len());
        for task in tasks {
            match self.work.remove(&task.name) {
                Some(work) => runnable.push(RunnableTask { task, work }),
                None => {
                    // Bodies run exactly once.
                    return Err(CrossrunError::TaskNotFound(task.name));
                }
            }
        }

        let names: Vec<_> = runnable.iter().map(|t| t.task.name.as_str()).collect();
        debug!(?names, "dispatching ready tasks");

        self.executor.spawn_ready_tasks(runnable).await
    }
}
