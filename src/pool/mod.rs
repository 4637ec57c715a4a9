//! Bounded-concurrency task pool with worker-scoped scratch files.
//!
//! Worker identities circulate through a channel: a task leases one, builds
//! its scratch handle from it, and returns it when done. The channel holds
//! exactly `workers` ids, so at most that many tasks run at once and no two
//! concurrent tasks ever share a scratch path.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use log::error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::scratch::{ScratchHandle, WorkerId};

/// Per-item outcome of a batch run. A failed item never aborts the batch.
#[derive(Debug, Clone)]
pub enum TaskOutcome<R> {
    Completed(R),
    Failed(String),
}

impl<R> TaskOutcome<R> {
    pub fn completed(self) -> Option<R> {
        match self {
            TaskOutcome::Completed(r) => Some(r),
            TaskOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_))
    }
}

pub struct WorkerPool {
    workers: usize,
    scratch_dir: PathBuf,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Run `task` over every item, at most `workers` at a time. Results come
    /// back in item order; an item whose task errors or panics yields
    /// `Failed` without touching its neighbours.
    pub async fn run_batch<I, R, F, Fut>(&self, items: Vec<I>, task: F) -> Vec<TaskOutcome<R>>
    where
        I: Send + 'static,
        R: Send + 'static,
        F: Fn(I, ScratchHandle) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<R>> + Send + 'static,
    {
        let total = items.len();
        let (tx, rx) = mpsc::channel(self.workers);
        for id in 0..self.workers {
            tx.send(WorkerId(id)).await.expect("channel sized to fit");
        }
        let rx = Arc::new(Mutex::new(rx));

        let mut set = JoinSet::new();
        for (idx, item) in items.into_iter().enumerate() {
            let task = task.clone();
            let tx = tx.clone();
            let rx = Arc::clone(&rx);
            let scratch_dir = self.scratch_dir.clone();
            set.spawn(async move {
                let id = {
                    let mut rx = rx.lock().await;
                    rx.recv().await.expect("sender held for pool lifetime")
                };
                let scratch = ScratchHandle::new(&scratch_dir, id);
                let outcome =
                    match std::panic::AssertUnwindSafe(task(item, scratch)).catch_unwind().await {
                        Ok(Ok(result)) => TaskOutcome::Completed(result),
                        Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
                        Err(_) => TaskOutcome::Failed("task panicked".to_string()),
                    };
                let _ = tx.send(id).await;
                (idx, outcome)
            });
        }
        drop(tx);

        let mut slots: Vec<Option<TaskOutcome<R>>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => error!("pool task join failed: {e}"),
            }
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    TaskOutcome::Failed("worker aborted before reporting".to_string())
                })
            })
            .collect()
    }
}
