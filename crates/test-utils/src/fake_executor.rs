use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crossrun::engine::{RuntimeEvent, TaskOutcome};
use crossrun::errors::Result;
use crossrun::exec::{ExecutorBackend, RunnableTask};
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which tasks were dispatched, in dispatch order
/// - never polls task bodies
/// - reports `TaskCompleted` for every dispatched task, in dispatch order:
///   `Failed` for names in `failing` and `Success` otherwise.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: BTreeSet<String>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: BTreeSet::new(),
        }
    }

    pub fn failing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(names.into_iter().map(Into::into));
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<RunnableTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        let completions: Vec<RuntimeEvent> = tasks
            .into_iter()
            .map(|runnable| {
                let name = runnable.task.name;
                executed.lock().unwrap().push(name.clone());
                let outcome = if self.failing.contains(&name) {
                    TaskOutcome::Failed
                } else {
                    TaskOutcome::Success
                };
                RuntimeEvent::TaskCompleted {
                    task: name,
                    outcome,
                }
            })
            .collect();

        // The runtime only drains events after this returns, so a batch
        // larger than the channel must be sent from elsewhere.
        tokio::spawn(async move {
            for event in completions {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Box::pin(async { Ok(()) })
    }
}
