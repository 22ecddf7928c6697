use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time;

/// Process-wide one-shot timer facility shared by every session. Tasks are
/// fire-and-forget: there is no cancellation handle for an individual task,
/// callers fence against staleness themselves. `shutdown` aborts everything
/// still pending.
#[derive(Clone, Default)]
pub struct Scheduler {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self
            .tasks
            .lock()
            .expect("The scheduler task set lock is poisoned.");
        // Reap whatever already ran so the set doesn't grow forever.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            time::sleep(delay).await;
            task.await;
        });
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks
            .lock()
            .expect("The scheduler task set lock is poisoned.")
            .len()
    }

    pub fn shutdown(&self) {
        self.tasks
            .lock()
            .expect("The scheduler task set lock is poisoned.")
            .abort_all();
    }
}
