//! The bounded worker pool backing asynchronous call execution.
//!
//! Tasks beyond `core_pool_size` are allowed up to `max_pool_size`
//! concurrently in flight; bounding is implemented with a counting
//! semaphore rather than a hand-rolled thread pool, since the actual OS
//! threads are already managed by the `tokio` runtime this crate requires.

use std::sync::Arc;

use tokio::sync::Semaphore;

use super::AsyncExecutionTask;

/// A client context's private async worker pool.
pub struct AsyncExecutorPool {
    core_pool_size: usize,
    max_pool_size: usize,
    permits: Arc<Semaphore>,
}

impl AsyncExecutorPool {
    pub(crate) fn new(core_pool_size: usize, max_pool_size: usize) -> AsyncExecutorPool {
        let max_pool_size = max_pool_size.max(core_pool_size).max(1);
        AsyncExecutorPool {
            core_pool_size,
            max_pool_size,
            permits: Arc::new(Semaphore::new(max_pool_size)),
        }
    }

    pub fn core_pool_size(&self) -> usize {
        self.core_pool_size
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Number of task slots currently free. Equal to `max_pool_size` when
    /// idle; shrinks back to it once every running task completes.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Submits `task` to run on the pool, blocking further submissions only
    /// once `max_pool_size` tasks are already in flight.
    pub(crate) fn submit(&self, task: AsyncExecutionTask) {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await;
            task.run().await;
        });
    }
}
