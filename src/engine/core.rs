// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces commands describing what
//! the IO shell (`engine::runtime::Runtime`) should do next. It owns the ready
//! queue and the in-flight count, so the concurrency bound is enforced here,
//! without Tokio, channels or processes.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::{RuntimeEvent, TaskName, TaskOutcome};
use crate::errors::Result;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Hand these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// `false` once the ready queue is empty and nothing is in flight.
    pub keep_running: bool,
}

/// Ready queue + in-flight accounting around a borrowed [`Scheduler`].
#[derive(Debug)]
pub struct CoreRuntime<'a> {
    scheduler: &'a mut Scheduler,
    ready: VecDeque<TaskName>,
    in_flight: usize,
    max_in_flight: usize,
}

impl<'a> CoreRuntime<'a> {
    pub fn new(scheduler: &'a mut Scheduler, max_in_flight: usize) -> Self {
        Self {
            scheduler,
            ready: VecDeque::new(),
            in_flight: 0,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Start a scheduler run and dispatch the first wave of ready tasks.
    pub fn start(&mut self) -> Result<CoreStep> {
        let step = self.scheduler.start_run()?;
        info!(
            run_id = self.scheduler.current_run_id(),
            ready = step.newly_ready.len(),
            blocked = step.newly_blocked.len(),
            max_in_flight = self.max_in_flight,
            "task run started"
        );
        Ok(self.absorb(step))
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted { task, outcome } => self.complete(&task, outcome),
            RuntimeEvent::TaskAborted { task, .. } => {
                // The shell stops the run; record the failure for diagnostics.
                self.in_flight = self.in_flight.saturating_sub(1);
                self.scheduler.step_completion(&task, TaskOutcome::Failed);
                self.ready.clear();
                CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                }
            }
        }
    }

    fn complete(&mut self, task: &str, outcome: TaskOutcome) -> CoreStep {
        self.in_flight = self.in_flight.saturating_sub(1);
        let step = self.scheduler.step_completion(task, outcome);
        self.absorb(step)
    }

    fn absorb(&mut self, step: SchedulerStep) -> CoreStep {
        if !step.newly_blocked.is_empty() {
            debug!(blocked = ?step.newly_blocked, "tasks blocked");
        }
        self.ready.extend(step.newly_ready);

        let mut commands = Vec::new();
        let dispatched = self.dispatch_ready();
        if !dispatched.is_empty() {
            commands.push(CoreCommand::DispatchTasks(dispatched));
        }

        CoreStep {
            commands,
            keep_running: self.in_flight > 0 || !self.ready.is_empty(),
        }
    }

    /// Pop ready tasks while there is worker capacity.
    fn dispatch_ready(&mut self) -> Vec<ScheduledTask> {
        let run_id = self.scheduler.current_run_id().unwrap_or(0);
        let mut dispatched = Vec::new();

        while self.in_flight < self.max_in_flight {
            let Some(name) = self.ready.pop_front() else {
                break;
            };
            self.scheduler.mark_running(&name);
            self.in_flight += 1;
            dispatched.push(ScheduledTask { name, run_id });
        }

        dispatched
    }
}
