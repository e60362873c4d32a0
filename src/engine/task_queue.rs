// src/engine/task_queue.rs

//! Public entry point for running a graph of tasks.

use std::collections::HashMap;
use std::io::{self, Write};

use tokio::sync::mpsc;

use crate::dag::{Scheduler, TaskRunState};
use crate::errors::Result;
use crate::exec::{ExecutorBackend, RealExecutorBackend};

use super::core::CoreRuntime;
use super::runtime::Runtime;
use super::task::{Task, TaskFuture};
use super::{RuntimeEvent, TaskName};

/// A set of tasks and their predecessor edges, plus the results of every
/// `run_tasks` call made so far.
#[derive(Default)]
pub struct TaskQueue {
    scheduler: Scheduler,
    work: HashMap<TaskName, TaskFuture>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("scheduler", &self.scheduler)
            .field("pending_bodies", &self.work.len())
            .finish()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: Task) -> Result<()> {
        let (info, work) = task.into_parts();
        let name = info.name.clone();
        self.scheduler.add_task(info)?;
        self.work.insert(name, work);
        Ok(())
    }

    pub fn enqueue_all<I>(&mut self, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = Task>,
    {
        for task in tasks {
            self.enqueue(task)?;
        }
        Ok(())
    }

    /// Run every task not run yet, with at most `concurrency` bodies in
    /// flight. Returns once nothing is runnable.
    ///
    /// Task failures are recorded, not returned; only infrastructure errors
    /// (invalid graph, fatal task errors) come back as `Err`.
    pub async fn run_tasks(&mut self, concurrency: usize) -> Result<()> {
        self.run_tasks_with(concurrency, RealExecutorBackend::new)
            .await
    }

    /// Like [`TaskQueue::run_tasks`], with a custom executor backend.
    pub async fn run_tasks_with<E, F>(&mut self, concurrency: usize, make_executor: F) -> Result<()>
    where
        E: ExecutorBackend,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
    {
        let (event_tx, event_rx) = mpsc::channel::<RuntimeEvent>(64);
        let executor = make_executor(event_tx);

        let work = std::mem::take(&mut self.work);
        let core = CoreRuntime::new(&mut self.scheduler, concurrency);
        let runtime = Runtime::new(core, event_rx, executor, work);

        // Unpolled bodies of blocked tasks are dropped with the runtime on
        // error; on success they are kept so a later run does not lose them.
        self.work = runtime.run().await?;
        Ok(())
    }

    /// Whether any task failed. Blocked tasks do not count.
    pub fn has_failed_tasks(&self) -> bool {
        self.scheduler.has_failed_tasks()
    }

    pub fn state_of(&self, name: &str) -> Option<TaskRunState> {
        self.scheduler.run_state_of(name)
    }

    /// One line per task: name, state, predecessors.
    pub fn print_tasks<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for name in self.scheduler.task_names() {
            self.print_task(out, name)?;
        }
        Ok(())
    }

    /// Failed and blocked tasks, and tasks still waiting on predecessors.
    pub fn print_problem_tasks<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for name in self.scheduler.task_names() {
            let state = self.state_of(name).unwrap_or(TaskRunState::NotStarted);
            match state {
                TaskRunState::Failed | TaskRunState::Blocked => self.print_task(out, name)?,
                TaskRunState::Pending => {
                    self.print_task(out, name)?;
                    let waiting = self.scheduler.unresolved_predecessors(name);
                    writeln!(out, "    waiting on: {}", waiting.join(", "))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn print_task<W: Write>(&self, out: &mut W, name: &str) -> io::Result<()> {
        let state = self.state_of(name).unwrap_or(TaskRunState::NotStarted);
        write!(out, "{name} [{state:?}]")?;
        if let Some(info) = self.scheduler.task_info(name) {
            if !info.after.is_empty() {
                write!(out, " after: {}", info.after.join(", "))?;
            }
            if !info.after_success.is_empty() {
                write!(out, " after success: {}", info.after_success.join(", "))?;
            }
        }
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskOutcome;
    use crate::errors::CrossrunError;

    fn ok(name: &str) -> Task {
        Task::new(name, async { Ok(TaskOutcome::Success) })
    }

    fn failing(name: &str) -> Task {
        Task::new(name, async { Ok(TaskOutcome::Failed) })
    }

    #[tokio::test]
    async fn failed_predecessor_blocks_success_dependents_only() {
        let mut queue = TaskQueue::new();
        queue
            .enqueue_all([
                failing("a"),
                ok("b").after_success("a"),
                ok("c").after("a"),
            ])
            .unwrap();

        queue.run_tasks(2).await.unwrap();

        assert_eq!(queue.state_of("a"), Some(TaskRunState::Failed));
        assert_eq!(queue.state_of("b"), Some(TaskRunState::Blocked));
        assert_eq!(queue.state_of("c"), Some(TaskRunState::Succeeded));
        assert!(queue.has_failed_tasks());

        let mut report = Vec::new();
        queue.print_problem_tasks(&mut report).unwrap();
        let report = String::from_utf8(report).unwrap();
        assert!(report.contains("a [Failed]"));
        assert!(report.contains("b [Blocked] after success: a"));
        assert!(!report.contains("c ["));
    }

    #[tokio::test]
    async fn errors_in_bodies_fail_the_task() {
        let mut queue = TaskQueue::new();
        queue
            .enqueue(Task::new("a", async {
                Err(CrossrunError::Target("device offline".into()))
            }))
            .unwrap();
        queue.run_tasks(1).await.unwrap();
        assert_eq!(queue.state_of("a"), Some(TaskRunState::Failed));
    }

    #[tokio::test]
    async fn second_run_depends_on_first() {
        let mut queue = TaskQueue::new();
        queue.enqueue(ok("a")).unwrap();
        queue.run_tasks(1).await.unwrap();

        queue.enqueue(ok("b").after_success("a")).unwrap();
        queue.run_tasks(1).await.unwrap();
        assert_eq!(queue.state_of("b"), Some(TaskRunState::Succeeded));
        assert!(!queue.has_failed_tasks());
    }

    #[tokio::test]
    async fn unknown_predecessor_fails_the_run() {
        let mut queue = TaskQueue::new();
        queue.enqueue(ok("a").after("ghost")).unwrap();
        let err = queue.run_tasks(1).await.unwrap_err();
        assert!(matches!(err, CrossrunError::UnknownDependency { .. }));
    }
}
