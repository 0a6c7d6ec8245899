//! Immutable HTTP responses.

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;

use crate::body::ResponseBody;
use crate::cache::CacheControl;
use crate::request::Request;

/// A response, immutable once built.
///
/// Responses are always held behind an `Arc`: a redirect chain links each
/// response to its [`Response::prior_response`], and a conditionally
/// revalidated response links to both the [`Response::cache_response`] it
/// started from and the [`Response::network_response`] that confirmed or
/// replaced it.
pub struct Response {
    status_code: u16,
    status_message: String,
    headers: HeaderMap,
    body: ResponseBody,
    content_length: Option<u64>,
    cache_control: CacheControl,
    request: Arc<Request>,
    prior_response: Option<Arc<Response>>,
    cache_response: Option<Arc<Response>>,
    network_response: Option<Arc<Response>>,
    sent_request_epoch_sec: u64,
    received_response_epoch_sec: u64,
}

impl Response {
    /// Starts building a response for `request`.
    pub fn builder(request: Arc<Request>) -> Builder {
        Builder::new(request)
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// The response body's byte length, when known up front (e.g. a cache
    /// hit, or a network response carrying `Content-Length`). Absent for a
    /// chunked network response until it has been fully read.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn cache_control(&self) -> &CacheControl {
        &self.cache_control
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// The response that preceded this one in a redirect chain, if any.
    pub fn prior_response(&self) -> Option<&Arc<Response>> {
        self.prior_response.as_ref()
    }

    /// The cached response this one was built from, present only after a
    /// conditional revalidation (always paired with [`Response::network_response`]).
    pub fn cache_response(&self) -> Option<&Arc<Response>> {
        self.cache_response.as_ref()
    }

    /// The network response that confirmed or replaced a cached entry,
    /// present only after a conditional revalidation.
    pub fn network_response(&self) -> Option<&Arc<Response>> {
        self.network_response.as_ref()
    }

    pub fn sent_request_epoch_sec(&self) -> u64 {
        self.sent_request_epoch_sec
    }

    pub fn received_response_epoch_sec(&self) -> u64 {
        self.received_response_epoch_sec
    }

    /// True if this response was served, wholly or in part, from the cache:
    /// either a straight cache hit or a promoted 304.
    pub fn is_from_cache(&self) -> bool {
        self.cache_response.is_some()
    }

    /// Length of the `prior_response` chain, used to enforce the redirect
    /// bound.
    pub fn redirect_count(&self) -> u32 {
        let mut count = 0;
        let mut current = self.prior_response.as_ref();
        while let Some(prior) = current {
            count += 1;
            current = prior.prior_response.as_ref();
        }
        count
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status_code", &self.status_code)
            .field("status_message", &self.status_message)
            .field("headers", &self.headers)
            .field("is_from_cache", &self.is_from_cache())
            .finish()
    }
}

/// Builds a [`Response`].
pub struct Builder {
    status_code: u16,
    status_message: String,
    headers: HeaderMap,
    body: ResponseBody,
    content_length: Option<u64>,
    cache_control: CacheControl,
    request: Arc<Request>,
    prior_response: Option<Arc<Response>>,
    cache_response: Option<Arc<Response>>,
    network_response: Option<Arc<Response>>,
    sent_request_epoch_sec: u64,
    received_response_epoch_sec: u64,
}

impl Builder {
    fn new(request: Arc<Request>) -> Builder {
        Builder {
            status_code: 200,
            status_message: "OK".to_string(),
            headers: HeaderMap::new(),
            body: ResponseBody::empty(),
            content_length: None,
            cache_control: CacheControl::default(),
            request,
            prior_response: None,
            cache_response: None,
            network_response: None,
            sent_request_epoch_sec: 0,
            received_response_epoch_sec: 0,
        }
    }

    pub fn status(mut self, code: u16, message: impl Into<String>) -> Builder {
        self.status_code = code;
        self.status_message = message.into();
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Builder {
        self.cache_control = headers
            .get(http::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(CacheControl::parse)
            .unwrap_or_default();
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: ResponseBody) -> Builder {
        self.body = body;
        self
    }

    pub fn content_length(mut self, len: u64) -> Builder {
        self.content_length = Some(len);
        self
    }

    pub fn prior_response(mut self, prior: Arc<Response>) -> Builder {
        self.prior_response = Some(prior);
        self
    }

    pub fn cache_response(mut self, cached: Arc<Response>) -> Builder {
        self.cache_response = Some(cached);
        self
    }

    pub fn network_response(mut self, network: Arc<Response>) -> Builder {
        self.network_response = Some(network);
        self
    }

    pub fn sent_request_epoch_sec(mut self, ts: u64) -> Builder {
        self.sent_request_epoch_sec = ts;
        self
    }

    pub fn received_response_epoch_sec(mut self, ts: u64) -> Builder {
        self.received_response_epoch_sec = ts;
        self
    }

    pub fn build(self) -> Response {
        Response {
            status_code: self.status_code,
            status_message: self.status_message,
            headers: self.headers,
            body: self.body,
            content_length: self.content_length,
            cache_control: self.cache_control,
            request: self.request,
            prior_response: self.prior_response,
            cache_response: self.cache_response,
            network_response: self.network_response,
            sent_request_epoch_sec: self.sent_request_epoch_sec,
            received_response_epoch_sec: self.received_response_epoch_sec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn req() -> Arc<Request> {
        Arc::new(Request::builder(Url::parse("http://127.0.0.1:9000/path").unwrap()).build())
    }

    #[test]
    fn redirect_count_follows_prior_response_chain() {
        let first = Arc::new(Response::builder(req()).status(301, "Moved").build());
        let second = Arc::new(
            Response::builder(req())
                .status(301, "Moved")
                .prior_response(first)
                .build(),
        );
        let third = Response::builder(req())
            .status(200, "OK")
            .prior_response(second)
            .build();
        assert_eq!(third.redirect_count(), 2);
    }

    #[test]
    fn cache_control_header_is_parsed_on_build() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CACHE_CONTROL, "no-store".parse().unwrap());
        let response = Response::builder(req()).headers(headers).build();
        assert!(response.cache_control().no_store);
    }

    #[test]
    fn revalidated_response_carries_both_cache_and_network_legs() {
        let cached = Arc::new(Response::builder(req()).status(200, "OK").build());
        let network = Arc::new(Response::builder(req()).status(304, "Not Modified").build());
        let synthesized = Response::builder(req())
            .status(200, "OK")
            .cache_response(cached)
            .network_response(network)
            .build();
        assert!(synthesized.is_from_cache());
        assert!(synthesized.network_response().is_some());
    }
}
