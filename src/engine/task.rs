// src/engine/task.rs

//! A named unit of work with hard and success predecessors.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::dag::TaskInfo;
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::Result;

/// Boxed body of a task. It is polled at most once, by one worker.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<TaskOutcome>> + Send + 'static>>;

/// A task before it is handed to a [`crate::engine::TaskQueue`].
pub struct Task {
    name: TaskName,
    after: Vec<TaskName>,
    after_success: Vec<TaskName>,
    work: TaskFuture,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("after", &self.after)
            .field("after_success", &self.after_success)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new<F>(name: impl Into<TaskName>, work: F) -> Self
    where
        F: Future<Output = Result<TaskOutcome>> + Send + 'static,
    {
        Self {
            name: name.into(),
            after: Vec::new(),
            after_success: Vec::new(),
            work: Box::pin(work),
        }
    }

    /// Start only after `task` has finished, whatever its result.
    pub fn after(mut self, task: impl Into<TaskName>) -> Self {
        self.after.push(task.into());
        self
    }

    /// Start only after `task` has succeeded; otherwise this task is blocked.
    pub fn after_success(mut self, task: impl Into<TaskName>) -> Self {
        self.after_success.push(task.into());
        self
    }

    pub fn after_success_all<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.after_success.extend(tasks.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (TaskInfo, TaskFuture) {
        (
            TaskInfo::new(self.name, self.after, self.after_success),
            self.work,
        )
    }
}
