//! The retry-driving request executor.
//!
//! Grounded directly on `HttpRequestExecutor`: a fresh [`HttpEngine`] is
//! constructed per attempt, the executor checks [`HttpEngine::retry_request`]
//! after each one, and bounds retries at [`crate::constants::MAX_RETRY_COUNT`].
//! The message `"too many retry request. N times."` on exhaustion matches
//! the original's `StringUtil::format` call verbatim.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::ClientContext;
use crate::constants::MAX_RETRY_COUNT;
use crate::engine::HttpEngine;
use crate::error::{Error, Result};
use crate::pool::Connection;
use crate::request::Request;
use crate::response::Response;

struct ExecutorState {
    cancelled: bool,
    engine: Option<Arc<HttpEngine>>,
    published_response: Option<Arc<Response>>,
}

/// Drives the bounded retry loop for a single [`crate::Call`].
pub(crate) struct RequestExecutor {
    context: Arc<ClientContext>,
    user_request: Arc<Request>,
    state: Mutex<ExecutorState>,
}

impl RequestExecutor {
    pub(crate) fn new(context: Arc<ClientContext>, request: Arc<Request>) -> RequestExecutor {
        RequestExecutor {
            context,
            user_request: request,
            state: Mutex::new(ExecutorState {
                cancelled: false,
                engine: None,
                published_response: None,
            }),
        }
    }

    /// Runs the call through the interceptor chain (dispatching straight to
    /// the retry loop if there are none), publishing the final response.
    pub(crate) async fn execute(self: &Arc<Self>) -> Result<Arc<Response>> {
        let interceptors = self.context.interceptors().to_vec();
        if interceptors.is_empty() {
            return self.execute_with_retry(self.user_request.clone()).await;
        }

        struct ExecutorNetworkStage(Arc<RequestExecutor>);
        #[async_trait::async_trait]
        impl crate::interceptor::NetworkStage for ExecutorNetworkStage {
            async fn execute_after_intercept(&self, request: Arc<Request>) -> Result<Arc<Response>> {
                self.0.execute_with_retry(request).await
            }

            fn current_connection(&self) -> Option<Arc<Connection>> {
                self.0.current_connection()
            }
        }

        let network = ExecutorNetworkStage(self.clone());
        let chain = crate::interceptor::CallInterceptorChain::new(&interceptors, self.user_request.clone(), &network);
        chain.run().await
    }

    async fn execute_with_retry(&self, request: Arc<Request>) -> Result<Arc<Response>> {
        let mut prior_response: Option<Arc<Response>> = None;
        let mut current_request = request;
        let mut retry_count = 0u32;

        loop {
            let engine = {
                let mut state = self.state.lock();
                if state.cancelled {
                    return Err(Error::execution("http request is cancelled."));
                }
                let engine = Arc::new(HttpEngine::new(
                    self.context.clone(),
                    current_request.clone(),
                    prior_response.clone(),
                ));
                state.engine = Some(engine.clone());
                engine
            };

            let response = engine.execute().await?;

            if let Some(retry_request) = HttpEngine::retry_request(&response) {
                retry_count += 1;
                if retry_count > MAX_RETRY_COUNT {
                    return Err(Error::execution(format!(
                        "too many retry request. {MAX_RETRY_COUNT} times."
                    )));
                }
                debug!(retry_count, url = %current_request.url(), "following redirect");
                engine.drain_body_for_cache(&response).await?;
                prior_response = Some(response);
                current_request = retry_request;
                continue;
            }

            let mut state = self.state.lock();
            state.published_response = Some(response.clone());
            return Ok(response);
        }
    }

    /// Cancels the in-flight (or most recently published) attempt.
    ///
    /// Snapshots {engine, published response} under the lock, then releases
    /// it before touching the engine or closing the body — the lock must
    /// never be held across I/O.
    pub(crate) fn cancel(&self) -> bool {
        let (engine, published_response) = {
            let mut state = self.state.lock();
            state.cancelled = true;
            (state.engine.clone(), state.published_response.clone())
        };

        let mut ok = true;
        if let Some(engine) = engine.as_ref() {
            if !engine.cancel() {
                ok = false;
            }
        }
        if let Some(response) = published_response {
            response.body().close();
            if let Some(engine) = engine {
                engine.forget_connection();
            }
        }
        ok
    }

    /// The connection the currently-running engine attempt is using, if one
    /// has been established yet.
    pub(crate) fn current_connection(&self) -> Option<Arc<Connection>> {
        self.state.lock().engine.as_ref().and_then(|engine| engine.get_connection())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub(crate) fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    pub(crate) fn request(&self) -> &Arc<Request> {
        &self.user_request
    }
}
