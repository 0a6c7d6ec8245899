//! Immutable HTTP requests.

use std::{any::Any, fmt, sync::Arc, time::Duration};

use http::{HeaderMap, HeaderValue, Method};
use url::Url;

use crate::cache::CacheControl;

/// A request, immutable once built.
///
/// Constructed exclusively through [`Request::Builder`]; there is no public
/// way to mutate a `Request` after `build()`, matching the invariant that
/// the cache-key fingerprint of a `Request` never changes underneath a
/// [`crate::Call`].
#[derive(Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<bytes::Bytes>,
    tag: Option<Arc<dyn Any + Send + Sync>>,
    cache_control: CacheControl,
}

impl Request {
    /// Starts building a request for `url`, defaulting to `GET`.
    pub fn builder(url: Url) -> Builder {
        Builder::new(url)
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request body, if any.
    pub fn body(&self) -> Option<&bytes::Bytes> {
        self.body.as_ref()
    }

    /// A caller-supplied opaque tag, retrievable via [`Any::downcast_ref`].
    pub fn tag<T: 'static>(&self) -> Option<&T> {
        self.tag.as_deref().and_then(|t| t.downcast_ref::<T>())
    }

    /// Cache-control overrides supplied by the caller, merged over whatever
    /// the `Cache-Control` request header already specifies.
    pub fn cache_control(&self) -> &CacheControl {
        &self.cache_control
    }

    /// Builds a request identical to this one but for the given header,
    /// used by the engine to attach `If-None-Match`/`If-Modified-Since`
    /// without disturbing the caller's original `Request`.
    pub(crate) fn with_header(&self, name: http::HeaderName, value: HeaderValue) -> Request {
        let mut headers = self.headers.clone();
        headers.insert(name, value);
        Request {
            method: self.method.clone(),
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
            tag: self.tag.clone(),
            cache_control: self.cache_control.clone(),
        }
    }

    /// Builds a request identical to this one but pointed at `url`, used by
    /// the engine to follow a redirect.
    pub(crate) fn with_url(&self, url: Url) -> Request {
        Request {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
            body: self.body.clone(),
            tag: self.tag.clone(),
            cache_control: self.cache_control.clone(),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .finish()
    }
}

/// Builds a [`Request`].
pub struct Builder {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<bytes::Bytes>,
    tag: Option<Arc<dyn Any + Send + Sync>>,
    cache_control: CacheControl,
}

impl Builder {
    fn new(url: Url) -> Builder {
        Builder {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
            tag: None,
            cache_control: CacheControl::default(),
        }
    }

    /// Sets the method.
    pub fn method(mut self, method: Method) -> Builder {
        self.method = method;
        self
    }

    /// Sets a request header, replacing any existing value.
    pub fn header(mut self, name: http::HeaderName, value: HeaderValue) -> Builder {
        self.headers.insert(name, value);
        self
    }

    /// Sets the full header map, replacing any headers set so far.
    pub fn headers(mut self, headers: HeaderMap) -> Builder {
        self.headers = headers;
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Builder {
        self.body = Some(body.into());
        self
    }

    /// Attaches an opaque tag retrievable later via [`Request::tag`].
    pub fn tag<T: Any + Send + Sync>(mut self, tag: T) -> Builder {
        self.tag = Some(Arc::new(tag));
        self
    }

    /// Forces the request to bypass the cache entirely (`no-store`).
    pub fn no_store(mut self) -> Builder {
        self.cache_control.no_store = true;
        self
    }

    /// Forces the engine to revalidate with the origin before using a
    /// cached response (`no-cache`).
    pub fn no_cache(mut self) -> Builder {
        self.cache_control.no_cache = true;
        self
    }

    /// Rejects cached responses older than `max_age`.
    pub fn max_age(mut self, max_age: Duration) -> Builder {
        self.cache_control.max_age = Some(max_age);
        self
    }

    /// Builds the immutable [`Request`].
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            tag: self.tag,
            cache_control: self.cache_control,
        }
    }
}
