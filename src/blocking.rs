//! A synchronous facade over [`crate::Call`], for callers outside an async
//! runtime.
//!
//! Unlike the teacher's `blocking::Client`, which hands work off to a
//! dedicated background thread over a channel, each [`Call::execute`] here
//! spins up its own current-thread `tokio` runtime for the duration of the
//! call and tears it down afterward. A full client's worth of state
//! (connection pool, cache, interceptors) still lives in the shared
//! [`crate::EasyHttp`]; only the executor is blocking.

use std::sync::Arc;

use crate::client::EasyHttp;
use crate::error::Result;
use crate::request::Request;
use crate::response::Response;

/// A blocking counterpart to [`crate::Call`].
///
/// # Panics
///
/// [`Call::execute`] panics if called from within an async runtime's worker
/// thread, the same restriction the teacher's blocking client documents —
/// nesting one runtime inside another deadlocks.
pub struct Call {
    inner: crate::call::Call,
}

impl Call {
    pub(crate) fn new(context: Arc<crate::client::ClientContext>, request: Arc<Request>) -> Call {
        Call {
            inner: crate::call::Call::new(context, request),
        }
    }

    /// Runs the call to completion on a private current-thread runtime.
    pub fn execute(&self) -> Result<Arc<Response>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to start blocking runtime");
        runtime.block_on(self.inner.execute())
    }

    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn request(&self) -> &Arc<Request> {
        self.inner.request()
    }

    #[cfg(test)]
    fn is_executed(&self) -> bool {
        self.inner.is_executed()
    }
}

/// A blocking counterpart to [`EasyHttp`], sharing the same [`Builder`](crate::client::Builder).
#[derive(Clone)]
pub struct BlockingEasyHttp {
    async_client: EasyHttp,
}

impl BlockingEasyHttp {
    pub fn builder() -> crate::client::Builder {
        EasyHttp::builder()
    }

    pub fn from_async(async_client: EasyHttp) -> BlockingEasyHttp {
        BlockingEasyHttp { async_client }
    }

    pub fn new_call(&self, request: Request) -> Call {
        self.async_client.new_call_blocking(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn a_fresh_blocking_call_is_not_executed() {
        let client = BlockingEasyHttp::from_async(EasyHttp::builder().build().unwrap());
        let request = Request::builder(Url::parse("http://127.0.0.1:1/unreachable").unwrap()).build();
        let call = client.new_call(request);
        assert!(!call.is_executed());
    }

    #[test]
    fn execute_runs_on_its_own_runtime_and_reports_transport_errors() {
        let client = BlockingEasyHttp::from_async(EasyHttp::builder().build().unwrap());
        let request = Request::builder(Url::parse("http://127.0.0.1:1/unreachable").unwrap()).build();
        let call = client.new_call(request);
        let result = call.execute();
        assert!(result.is_err());
    }
}
