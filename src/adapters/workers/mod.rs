//! Worker pool adapters.
//!
//! - `TokioWorkerPool` - blocking-thread pool on a Tokio runtime, with a
//!   cap on how many handler tasks run at once
//! - `InlineWorkerPool` - runs every task on the submitting thread

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::ports::{Task, WorkerPool};

/// Runs submitted tasks on Tokio's blocking pool.
///
/// Handlers are synchronous and may block, so they never run on the async
/// worker threads. At most `max_concurrent` run at any one time; the rest
/// wait for a permit.
#[derive(Clone)]
pub struct TokioWorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl TokioWorkerPool {
    pub fn new(handle: Handle, max_concurrent: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Binds to the runtime the caller is running on.
    pub fn current(max_concurrent: usize) -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(Handle::try_current()?, max_concurrent))
    }
}

impl WorkerPool for TokioWorkerPool {
    fn submit(&self, task: Task) {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            if let Err(e) = tokio::task::spawn_blocking(task).await {
                tracing::error!(error = %e, "Worker task failed");
            }
        });
    }
}

/// Runs tasks immediately on the caller's thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineWorkerPool;

impl WorkerPool for InlineWorkerPool {
    fn submit(&self, task: Task) {
        task();
    }
}
