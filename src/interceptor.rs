//! The application interceptor chain.
//!
//! Grounded directly on `CallInterceptorChain`: each call to `proceed`
//! advances the shared iterator and materializes a fresh chain node bound
//! to it, so nested/repeated `proceed` calls behave correctly. When the
//! iterator is exhausted, the chain dispatches to the executor's
//! post-intercept entry point instead of another interceptor.

use std::sync::Arc;

use crate::error::Result;
use crate::pool::Connection;
use crate::request::Request;
use crate::response::Response;

/// A hook that observes or rewrites a request/response pair around the
/// network call.
///
/// Implementations must call [`Chain::proceed`] zero, one, or more times;
/// zero times to short-circuit (e.g. serve a synthetic response), more than
/// once to retry locally. Most interceptors call it exactly once.
#[async_trait::async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, chain: &mut dyn Chain) -> Result<Arc<Response>>;
}

/// The interface an [`Interceptor`] sees into the rest of the pipeline.
#[async_trait::async_trait]
pub trait Chain: Send {
    /// The request as it stands at this point in the chain.
    fn request(&self) -> &Arc<Request>;

    /// The connection used to service this call, if one has been
    /// established yet (absent before the network stage runs, and absent
    /// again once the executor has dropped its reference on cancel).
    fn connection(&self) -> Option<Arc<Connection>>;

    /// Hands `request` to the next interceptor, or to the network stage if
    /// this is the last one in the chain.
    async fn proceed(&mut self, request: Arc<Request>) -> Result<Arc<Response>>;
}

/// What a chain dispatches to once every interceptor has run.
#[async_trait::async_trait]
pub(crate) trait NetworkStage: Send + Sync {
    async fn execute_after_intercept(&self, request: Arc<Request>) -> Result<Arc<Response>>;

    /// The connection the currently-running (or most recently run) engine
    /// attempt is using, if any. Default `None` for stages with no notion
    /// of a connection (e.g. tests).
    fn current_connection(&self) -> Option<Arc<Connection>> {
        None
    }
}

pub(crate) struct CallInterceptorChain<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    position: usize,
    request: Arc<Request>,
    network: &'a dyn NetworkStage,
}

impl<'a> CallInterceptorChain<'a> {
    pub(crate) fn new(
        interceptors: &'a [Arc<dyn Interceptor>],
        request: Arc<Request>,
        network: &'a dyn NetworkStage,
    ) -> CallInterceptorChain<'a> {
        CallInterceptorChain {
            interceptors,
            position: 0,
            request,
            network,
        }
    }

    /// Runs the whole chain starting from the first interceptor, or
    /// straight to the network stage if there are none.
    pub(crate) async fn run(mut self) -> Result<Arc<Response>> {
        match self.interceptors.first() {
            None => self.network.execute_after_intercept(self.request).await,
            Some(first) => first.intercept(&mut self).await,
        }
    }
}

#[async_trait::async_trait]
impl<'a> Chain for CallInterceptorChain<'a> {
    fn request(&self) -> &Arc<Request> {
        &self.request
    }

    fn connection(&self) -> Option<Arc<Connection>> {
        self.network.current_connection()
    }

    async fn proceed(&mut self, request: Arc<Request>) -> Result<Arc<Response>> {
        self.position += 1;
        self.request = request.clone();
        match self.interceptors.get(self.position) {
            Some(next) => {
                let mut chain = CallInterceptorChain {
                    interceptors: self.interceptors,
                    position: self.position,
                    request,
                    network: self.network,
                };
                next.intercept(&mut chain).await
            }
            None => self.network.execute_after_intercept(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use url::Url;

    struct RecordingNetwork;

    #[async_trait::async_trait]
    impl NetworkStage for RecordingNetwork {
        async fn execute_after_intercept(&self, request: Arc<Request>) -> Result<Arc<Response>> {
            Ok(Arc::new(
                Response::builder(request).status(200, "OK").build(),
            ))
        }
    }

    struct AddHeaderInterceptor;

    #[async_trait::async_trait]
    impl Interceptor for AddHeaderInterceptor {
        async fn intercept(&self, chain: &mut dyn Chain) -> Result<Arc<Response>> {
            let request = chain.request().clone();
            let tagged = Arc::new(request.with_header(
                http::header::HeaderName::from_static("x-intercepted"),
                HeaderValue::from_static("yes"),
            ));
            chain.proceed(tagged).await
        }
    }

    fn request() -> Arc<Request> {
        Arc::new(Request::builder(Url::parse("http://127.0.0.1:9000/path").unwrap()).build())
    }

    #[tokio::test]
    async fn empty_chain_dispatches_straight_to_network() {
        let network = RecordingNetwork;
        let chain = CallInterceptorChain::new(&[], request(), &network);
        let response = chain.run().await.unwrap();
        assert_eq!(response.status_code(), 200);
    }

    #[tokio::test]
    async fn interceptor_can_rewrite_the_request_before_proceeding() {
        let network = RecordingNetwork;
        let interceptors: Vec<Arc<dyn Interceptor>> = vec![Arc::new(AddHeaderInterceptor)];
        let chain = CallInterceptorChain::new(&interceptors, request(), &network);
        let response = chain.run().await.unwrap();
        assert!(response.request().headers().contains_key("x-intercepted"));
    }

    #[tokio::test]
    async fn chain_of_two_interceptors_both_run() {
        let network = RecordingNetwork;
        let interceptors: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(AddHeaderInterceptor), Arc::new(AddHeaderInterceptor)];
        let chain = CallInterceptorChain::new(&interceptors, request(), &network);
        let response = chain.run().await.unwrap();
        assert!(response.request().headers().contains_key("x-intercepted"));
    }
}
