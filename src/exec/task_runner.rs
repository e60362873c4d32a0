// src/exec/task_runner.rs

//! Individual task body runner.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::{RuntimeEvent, TaskOutcome};

use super::backend::RunnableTask;

/// Run a single task body and report exactly one event for it.
///
/// - `Ok(outcome)` is forwarded as `TaskCompleted`.
/// - An ordinary error or a panic fails the task.
/// - A fatal error (see [`crate::errors::CrossrunError::is_fatal`]) aborts the
///   whole run.
pub async fn run_task(runnable: RunnableTask, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let RunnableTask { task, work } = runnable;
    info!(task = %task.name, run_id = task.run_id, "starting task");

    // The body runs on its own task so that a panic surfaces as a JoinError.
    let joined = tokio::spawn(work).await;

    let event = match joined {
        Ok(Ok(outcome)) => {
            info!(task = %task.name, run_id = task.run_id, ?outcome, "task finished");
            RuntimeEvent::TaskCompleted {
                task: task.name.clone(),
                outcome,
            }
        }
        Ok(Err(err)) if err.is_fatal() => {
            error!(task = %task.name, run_id = task.run_id, error = %err, "fatal task error");
            RuntimeEvent::TaskAborted {
                task: task.name.clone(),
                error: err,
            }
        }
        Ok(Err(err)) => {
            warn!(task = %task.name, run_id = task.run_id, error = %err, "task failed with error");
            RuntimeEvent::TaskCompleted {
                task: task.name.clone(),
                outcome: TaskOutcome::Failed,
            }
        }
        Err(join_err) => {
            error!(task = %task.name, run_id = task.run_id, error = %join_err, "task panicked");
            RuntimeEvent::TaskCompleted {
                task: task.name.clone(),
                outcome: TaskOutcome::Failed,
            }
        }
    };

    if runtime_tx.send(event).await.is_err() {
        debug!(task = %task.name, "runtime gone; dropping task event");
    }
}
