//! Asynchronous call execution.
//!
//! Grounded on `HttpAsyncExecutionTask`: a task wraps an executor and a
//! callback, is submitted to [`pool::AsyncExecutorPool`], and on completion
//! invokes exactly one of [`ResponseCallback::on_response`] /
//! [`ResponseCallback::on_failure`].

mod pool;

pub use pool::AsyncExecutorPool;

use std::sync::Arc;

use crate::error::Error;
use crate::executor::RequestExecutor;
use crate::response::Response;

/// Completion callback for [`crate::Call::execute_async`].
pub trait ResponseCallback: Send + Sync + 'static {
    fn on_response(&self, response: Arc<Response>);
    fn on_failure(&self, error: Error);
}

/// Wraps one executor invocation together with the callback that reports
/// its outcome, ready to be handed to [`AsyncExecutorPool::submit`].
pub(crate) struct AsyncExecutionTask {
    executor: Arc<RequestExecutor>,
    callback: Arc<dyn ResponseCallback>,
}

impl AsyncExecutionTask {
    pub(crate) fn new(
        executor: Arc<RequestExecutor>,
        callback: Arc<dyn ResponseCallback>,
    ) -> AsyncExecutionTask {
        AsyncExecutionTask { executor, callback }
    }

    /// Runs the wrapped executor and reports exactly one outcome. A task
    /// whose executor was cancelled before this ran reports failure rather
    /// than ever calling `on_response`.
    pub(crate) async fn run(self) {
        if self.executor.is_cancelled() {
            self.callback
                .on_failure(Error::execution("http request is cancelled."));
            return;
        }
        match self.executor.execute().await {
            Ok(response) => self.callback.on_response(response),
            Err(error) => self.callback.on_failure(error),
        }
    }
}
