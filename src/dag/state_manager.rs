// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dag::task_info::{EdgeKind, RunState, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
///
/// Every transition to a terminal state goes through [`StateManager::resolve`],
/// which relaxes the edges to the task's dependents.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Pull every not-yet-started task into the current run.
    ///
    /// Predecessors finished by an earlier run count as resolved. Returns the
    /// tasks that are ready immediately and those blocked immediately.
    pub fn admit_new_tasks(&mut self) -> (Vec<TaskName>, Vec<TaskName>) {
        let mut admitted: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| info.run_state.is_none())
            .map(|info| info.name.clone())
            .collect();
        admitted.sort();

        for name in &admitted {
            if let Some(info) = self.tasks.get_mut(name) {
                info.run_state = Some(RunState::Pending);
            }
        }

        let mut ready = Vec::new();
        let mut blocked_roots = Vec::new();

        for name in &admitted {
            let mut waiting_on = 0;
            let mut blocked = false;

            for (dep, kind) in self.graph.dependencies_of(name) {
                match self.tasks.get(dep).and_then(|d| d.run_state) {
                    Some(RunState::Succeeded) => {}
                    Some(RunState::Failed) | Some(RunState::Blocked) => {
                        if *kind == EdgeKind::Success {
                            blocked = true;
                        }
                    }
                    _ => waiting_on += 1,
                }
            }

            if let Some(info) = self.tasks.get_mut(name) {
                info.waiting_on = waiting_on;
            }

            if blocked {
                blocked_roots.push(name.clone());
            } else if waiting_on == 0 {
                ready.push(name.clone());
            }
        }

        for name in &ready {
            if let Some(info) = self.tasks.get_mut(name) {
                info.run_state = Some(RunState::Ready);
            }
        }

        let mut newly_blocked = Vec::new();
        for name in blocked_roots {
            let still_pending = self
                .tasks
                .get(&name)
                .is_some_and(|info| info.run_state == Some(RunState::Pending));
            if !still_pending {
                continue;
            }
            debug!(task = %name, "success predecessor finished unsuccessfully in an earlier run; blocking");
            newly_blocked.push(name.clone());
            let (mut more_ready, mut more_blocked) = self.resolve(&name, RunState::Blocked);
            ready.append(&mut more_ready);
            newly_blocked.append(&mut more_blocked);
        }

        (ready, newly_blocked)
    }

    /// Move `name` into the terminal `state` and relax edges to its dependents.
    ///
    /// - A dependent with a success edge on a task that did not succeed is
    ///   blocked, and the blocking propagates through its own dependents.
    /// - A dependent whose last unresolved predecessor this was becomes `Ready`.
    ///
    /// Returns `(newly_ready, newly_blocked)`; the root itself is not included.
    pub fn resolve(&mut self, name: &str, state: RunState) -> (Vec<TaskName>, Vec<TaskName>) {
        debug_assert!(state.is_terminal());

        let mut newly_ready = Vec::new();
        let mut newly_blocked = Vec::new();

        match self.tasks.get_mut(name) {
            Some(info) => {
                info.run_state = Some(state);
                info.finished_in_run = self.current_run_id;
            }
            None => {
                warn!(task = %name, "resolving unknown task; ignoring");
                return (newly_ready, newly_blocked);
            }
        }

        let graph = self.graph;
        let mut stack: Vec<(TaskName, RunState)> = vec![(name.to_string(), state)];

        while let Some((done, done_state)) = stack.pop() {
            for dependent in graph.dependents_of(&done) {
                let kind = graph
                    .edge_kind(dependent, &done)
                    .unwrap_or(EdgeKind::Completion);

                let Some(info) = self.tasks.get_mut(dependent) else {
                    continue;
                };
                if info.run_state != Some(RunState::Pending) {
                    continue;
                }

                info.waiting_on = info.waiting_on.saturating_sub(1);

                if kind == EdgeKind::Success && done_state != RunState::Succeeded {
                    info.run_state = Some(RunState::Blocked);
                    info.finished_in_run = self.current_run_id;
                    debug!(
                        task = %info.name,
                        upstream = %done,
                        "success predecessor did not succeed; blocking"
                    );
                    newly_blocked.push(info.name.clone());
                    stack.push((info.name.clone(), RunState::Blocked));
                } else if info.waiting_on == 0 {
                    info.run_state = Some(RunState::Ready);
                    debug!(task = %info.name, "all predecessors resolved; ready");
                    newly_ready.push(info.name.clone());
                }
            }
        }

        (newly_ready, newly_blocked)
    }

    /// Whether every task that joined a run has reached a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks
            .values()
            .all(|info| info.run_state.is_none_or(|s| s.is_terminal()))
    }
}
