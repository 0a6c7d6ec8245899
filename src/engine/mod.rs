//! The HTTP engine: one network attempt.
//!
//! An engine instance is scoped to a single try within the executor's retry
//! loop (a fresh one is constructed for each retry, carrying the prior
//! response forward). It may be satisfied entirely from the cache, issue a
//! conditional revalidation, or perform a full network fetch — see
//! [`HttpEngine::execute`].

mod network;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use http::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, LOCATION};
use parking_lot::Mutex;

use crate::body::ResponseBody;
use crate::cache::{self, CacheStorage, fingerprint};
use crate::client::ClientContext;
use crate::error::{Error, Result};
use crate::pool::Connection;
use crate::request::Request;
use crate::response::Response;

/// A single network attempt against a client's shared context.
pub(crate) struct HttpEngine {
    context: Arc<ClientContext>,
    request: Arc<Request>,
    prior_response: Option<Arc<Response>>,
    cancelled: AtomicBool,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl HttpEngine {
    pub(crate) fn new(
        context: Arc<ClientContext>,
        request: Arc<Request>,
        prior_response: Option<Arc<Response>>,
    ) -> HttpEngine {
        HttpEngine {
            context,
            request,
            prior_response,
            cancelled: AtomicBool::new(false),
            connection: Mutex::new(None),
        }
    }

    /// Runs the single attempt this engine represents: cache lookup,
    /// conditional revalidation, or full network fetch.
    pub(crate) async fn execute(&self) -> Result<Arc<Response>> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(Error::execution("http request is cancelled."));
        }

        let key = fingerprint(&self.request);
        let now = now_epoch();

        if let Some(storage) = self.context.cache() {
            if !self.request.cache_control().no_store {
                if let Some(record) = storage.metadata().get(&key, now) {
                    let cached_response = Arc::new(self.load_cached_response(storage, &record)?);
                    if !self.request.cache_control().no_cache && is_fresh(&record, now) {
                        trace!(cache_key = %key, "serving fresh cached response");
                        return Ok(cached_response);
                    }
                    debug!(cache_key = %key, "revalidating stale cache entry");
                    return self.revalidate(&record, cached_response, now).await;
                }
            }
        }

        self.fetch_network(self.request.clone(), now, None).await
    }

    fn load_cached_response(&self, storage: &CacheStorage, record: &cache::CacheRecord) -> Result<Response> {
        let bytes = std::fs::read(storage.payload_path(&record.cache_key))
            .map_err(|e| Error::execution("failed to read cache payload").with_source(e))?;
        let mut builder = Response::builder(self.request.clone())
            .status(record.status_code, record.status_message.clone())
            .headers(record.response_headers())
            .content_length(bytes.len() as u64)
            .body(ResponseBody::from_bytes(bytes.into()))
            .sent_request_epoch_sec(record.sent_request_at_epoch)
            .received_response_epoch_sec(record.received_response_at_epoch);
        if let Some(prior) = self.prior_response.clone() {
            builder = builder.prior_response(prior);
        }
        Ok(builder.build())
    }

    async fn revalidate(
        &self,
        record: &cache::CacheRecord,
        cached_response: Arc<Response>,
        now: u64,
    ) -> Result<Arc<Response>> {
        let headers = record.response_headers();
        let mut conditional = self.request.as_ref().clone();
        if let Some(etag) = headers.get(ETAG) {
            conditional = conditional.with_header(IF_NONE_MATCH, etag.clone());
        }
        if let Some(last_modified) = headers.get(LAST_MODIFIED) {
            conditional = conditional.with_header(IF_MODIFIED_SINCE, last_modified.clone());
        }

        let network_response = self
            .fetch_network(Arc::new(conditional), now, Some(cached_response.clone()))
            .await?;
        if network_response.status_code() != 304 {
            return Ok(network_response);
        }

        let body_bytes = cached_response.body().read_to_end().await?;
        let mut builder = Response::builder(self.request.clone())
            .status(cached_response.status_code(), cached_response.status_message())
            .headers(cached_response.headers().clone())
            .content_length(body_bytes.len() as u64)
            .body(ResponseBody::from_bytes(body_bytes))
            .sent_request_epoch_sec(cached_response.sent_request_epoch_sec())
            .received_response_epoch_sec(cached_response.received_response_epoch_sec())
            .cache_response(cached_response)
            .network_response(network_response);
        if let Some(prior) = self.prior_response.clone() {
            builder = builder.prior_response(prior);
        }
        Ok(Arc::new(builder.build()))
    }

    async fn fetch_network(
        &self,
        request: Arc<Request>,
        sent_at: u64,
        cache_response: Option<Arc<Response>>,
    ) -> Result<Arc<Response>> {
        network::fetch(self, &request, sent_at, cache_response, self.prior_response.clone()).await
    }

    pub(crate) fn remember_connection(&self, connection: Arc<Connection>) {
        *self.connection.lock() = Some(connection);
    }

    pub(crate) fn forget_connection(&self) {
        *self.connection.lock() = None;
    }

    /// The connection this attempt is using, once established.
    pub(crate) fn get_connection(&self) -> Option<Arc<Connection>> {
        self.connection.lock().clone()
    }

    pub(crate) fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    /// Cooperative cancellation: marks the engine cancelled so a
    /// not-yet-started attempt fails fast. Does not itself touch the
    /// connection or body — that happens when the executor subsequently
    /// closes the published response's body.
    pub(crate) fn cancel(&self) -> bool {
        self.cancelled.store(true, Ordering::Release);
        true
    }

    /// Reads a response's body fully so it can be attached to
    /// `prior_response` for a retry without leaving the connection
    /// straddling two logical requests.
    pub(crate) async fn drain_body_for_cache(&self, response: &Response) -> Result<()> {
        response.body().read_to_end().await?;
        Ok(())
    }

    /// Maps a response to a follow-up request, or `None` if no retry is
    /// warranted. Retry is driven exclusively by HTTP redirects (3xx with a
    /// `Location` header); authentication-challenge-driven retry is not
    /// implemented.
    pub(crate) fn retry_request(response: &Response) -> Option<Arc<Request>> {
        if !(300..400).contains(&response.status_code()) {
            return None;
        }
        let location = response.headers().get(LOCATION)?.to_str().ok()?;
        let redirected = response.request().url().join(location).ok()?;
        Some(Arc::new(response.request().with_url(redirected)))
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_fresh(record: &cache::CacheRecord, now: u64) -> bool {
    let cache_control = record
        .response_headers()
        .get(http::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(crate::cache::CacheControl::parse)
        .unwrap_or_default();
    match cache_control.max_age {
        Some(max_age) => now.saturating_sub(record.received_response_at_epoch) < max_age.as_secs(),
        None => false,
    }
}
