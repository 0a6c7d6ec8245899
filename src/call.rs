//! `Call`: a single, executed-at-most-once HTTP request.
//!
//! Grounded on the original `HttpCall`/`Call` split: a call is bound to one
//! [`Request`] and one client context, may run exactly once (synchronously
//! via [`Call::execute`] or asynchronously via [`Call::execute_async`]), and
//! can be cancelled from any thread at any point in its lifetime.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::async_exec::{AsyncExecutionTask, ResponseCallback};
use crate::client::ClientContext;
use crate::error::{Error, Result};
use crate::executor::RequestExecutor;
use crate::request::Request;
use crate::response::Response;

struct CallState {
    executed: bool,
}

/// A single HTTP request, bound to a client, ready to execute once.
pub struct Call {
    executor: Arc<RequestExecutor>,
    state: Mutex<CallState>,
}

impl Call {
    pub(crate) fn new(context: Arc<ClientContext>, request: Arc<Request>) -> Call {
        Call {
            executor: Arc::new(RequestExecutor::new(context, request)),
            state: Mutex::new(CallState { executed: false }),
        }
    }

    /// Runs the call to completion, returning the final [`Response`].
    ///
    /// Fails with `IllegalState` if this call has already been executed —
    /// a `Call` is single-use, matching the original `HttpCall` contract.
    pub async fn execute(&self) -> Result<Arc<Response>> {
        self.mark_executed()?;
        self.executor.execute().await
    }

    /// Runs the call on the client's async worker pool, reporting the
    /// outcome to `callback` instead of blocking the caller.
    ///
    /// Fails with `IllegalArgument` (code `100700`) if `callback` is `None`.
    pub fn execute_async(&self, callback: Option<Arc<dyn ResponseCallback>>) -> Result<()> {
        let callback = callback.ok_or_else(|| Error::illegal_argument("ResponseCallback can not be null."))?;
        self.mark_executed()?;
        let task = AsyncExecutionTask::new(self.executor.clone(), callback);
        self.executor.context().async_pool().submit(task);
        Ok(())
    }

    /// Cancels this call. Safe to call before, during, or after execution;
    /// a no-op once the call has already finished successfully and its
    /// response body has been fully consumed.
    pub fn cancel(&self) -> bool {
        self.executor.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.executor.is_cancelled()
    }

    /// The request this call was constructed from.
    pub fn request(&self) -> &Arc<Request> {
        self.executor.request()
    }

    /// Whether `execute`/`execute_async` has already been called.
    ///
    /// Not part of the public API (the original surface deprecated and then
    /// dropped it); kept `pub(crate)` for the double-execute guard and tests.
    pub(crate) fn is_executed(&self) -> bool {
        self.state.lock().executed
    }

    fn mark_executed(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.executed {
            return Err(Error::illegal_state("already executed."));
        }
        state.executed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::EasyHttp;
    use std::sync::atomic::{AtomicBool, Ordering};
    use url::Url;

    fn make_call() -> Call {
        let client = EasyHttp::builder().build().unwrap();
        let request = Request::builder(Url::parse("http://127.0.0.1:1/unreachable").unwrap()).build();
        client.new_call(request)
    }

    #[tokio::test]
    async fn executing_twice_is_illegal_state() {
        let call = make_call();
        let _ = call.execute().await;
        let second = call.execute().await;
        assert!(second.unwrap_err().is_illegal_state());
    }

    #[test]
    fn execute_async_marks_the_call_executed() {
        struct Noop;
        impl ResponseCallback for Noop {
            fn on_response(&self, _response: Arc<Response>) {}
            fn on_failure(&self, _error: Error) {}
        }

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let call = make_call();
        call.execute_async(Some(Arc::new(Noop))).unwrap();
        assert!(call.is_executed());
    }

    #[test]
    fn execute_async_with_null_callback_is_illegal_argument() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let call = make_call();
        let err = call.execute_async(None).unwrap_err();
        assert!(err.is_illegal_argument());
        assert_eq!(err.code(), 100700);
        assert!(!call.is_executed());
    }

    #[tokio::test]
    async fn cancel_before_execute_fails_the_call() {
        let call = make_call();
        call.cancel();
        let result = call.execute().await;
        assert!(result.unwrap_err().is_execution());
    }

    #[test]
    fn fresh_call_is_not_executed_or_cancelled() {
        let call = make_call();
        assert!(!call.is_executed());
        assert!(!call.is_cancelled());
    }

    #[tokio::test]
    async fn async_execution_reports_failure_on_unreachable_host() {
        let call = make_call();
        let done = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        struct Recorder {
            done: Arc<AtomicBool>,
            failed: Arc<AtomicBool>,
        }
        impl ResponseCallback for Recorder {
            fn on_response(&self, _response: Arc<Response>) {
                self.done.store(true, Ordering::SeqCst);
            }
            fn on_failure(&self, _error: Error) {
                self.failed.store(true, Ordering::SeqCst);
                self.done.store(true, Ordering::SeqCst);
            }
        }

        call.execute_async(Some(Arc::new(Recorder {
            done: done.clone(),
            failed: failed.clone(),
        })))
        .unwrap();

        for _ in 0..200 {
            if done.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(done.load(Ordering::SeqCst));
        assert!(failed.load(Ordering::SeqCst));
    }
}
