//! Client assembly: `EasyHttp` and its `Builder`.
//!
//! Adapted from the teacher's `ClientBuilder`/`Client` split: the builder
//! accumulates configuration into a plain `Config`, then bakes it into a
//! single immutable `ClientContext` shared by every `Call` made from the
//! resulting `EasyHttp`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::CertificateDer;

use crate::async_exec::AsyncExecutorPool;
use crate::cache::CacheStorage;
use crate::call::Call;
use crate::error::{Error, Result};
use crate::interceptor::Interceptor;
use crate::pool::ConnectionPool;
use crate::proxy::Proxy;
use crate::request::Request;

/// Resources shared by every [`Call`] created from the same [`EasyHttp`].
pub(crate) struct ClientContext {
    cache: Option<CacheStorage>,
    pool: ConnectionPool,
    interceptors: Vec<Arc<dyn Interceptor>>,
    proxy: Option<Proxy>,
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    async_pool: AsyncExecutorPool,
    ca_trust: Option<Vec<CertificateDer<'static>>>,
}

impl ClientContext {
    pub(crate) fn cache(&self) -> Option<&CacheStorage> {
        self.cache.as_ref()
    }

    pub(crate) fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub(crate) fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub(crate) fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub(crate) fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub(crate) fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    pub(crate) fn async_pool(&self) -> &AsyncExecutorPool {
        &self.async_pool
    }

    /// Caller-supplied CA trust roots, in place of the bundled webpki set.
    pub(crate) fn ca_trust_roots(&self) -> Option<&[CertificateDer<'static>]> {
        self.ca_trust.as_deref()
    }
}

/// An HTTP client: an immutable, shareable bundle of cache, connection
/// pool, interceptors, and transport configuration.
///
/// Cheap to clone (an `Arc` around its context); the recommended pattern is
/// to build one `EasyHttp` and reuse it for the lifetime of the process.
#[derive(Clone)]
pub struct EasyHttp {
    context: Arc<ClientContext>,
}

impl std::fmt::Debug for EasyHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EasyHttp").finish_non_exhaustive()
    }
}

impl EasyHttp {
    /// Starts building a client.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Starts a new [`Call`] bound to this client's shared context.
    pub fn new_call(&self, request: Request) -> Call {
        Call::new(self.context.clone(), Arc::new(request))
    }

    /// Starts a new [`crate::blocking::Call`] bound to this client's shared
    /// context.
    #[cfg(feature = "blocking")]
    pub fn new_call_blocking(&self, request: Request) -> crate::blocking::Call {
        crate::blocking::Call::new(self.context.clone(), Arc::new(request))
    }

    /// Number of connections currently pooled, across all endpoints.
    ///
    /// A testing seam, not a tuning knob: lets integration tests observe
    /// pool-membership transitions (e.g. release-on-EOF, remove-on-cancel)
    /// through the real `Call`/engine path instead of poking `ConnectionPool`
    /// directly.
    pub fn pool_connection_count(&self) -> usize {
        self.context.pool().total_count()
    }
}

/// Builds an [`EasyHttp`].
pub struct Builder {
    cache_dir: Option<PathBuf>,
    cache_max_size: Option<u64>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    proxy: Option<Proxy>,
    connect_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    async_core_pool_size: usize,
    async_max_pool_size: usize,
    ca_trust_pem: Option<Vec<u8>>,
}

impl Builder {
    fn new() -> Builder {
        Builder {
            cache_dir: None,
            cache_max_size: None,
            interceptors: Vec::new(),
            proxy: None,
            connect_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            async_core_pool_size: crate::constants::ASYNC_CORE_POOL_SIZE,
            async_max_pool_size: crate::constants::ASYNC_MAX_POOL_SIZE,
            ca_trust_pem: None,
        }
    }

    /// Enables the on-disk response cache, rooted at `dir`.
    pub fn cache(mut self, dir: impl Into<PathBuf>) -> Builder {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Caps the on-disk cache's total payload size in bytes; once exceeded,
    /// `commit` evicts least-recently-used entries until it fits again. No
    /// effect unless [`Builder::cache`] is also set.
    pub fn cache_max_size(mut self, bytes: u64) -> Builder {
        self.cache_max_size = Some(bytes);
        self
    }

    /// Overrides the trusted CA set used to verify TLS server certificates,
    /// in place of the bundled webpki roots. `pem` is one or more
    /// PEM-encoded certificates.
    pub fn ca_trust(mut self, pem: impl Into<Vec<u8>>) -> Builder {
        self.ca_trust_pem = Some(pem.into());
        self
    }

    /// Appends an interceptor to the call-level interceptor chain.
    pub fn add_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Builder {
        self.interceptors.push(interceptor);
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Builder {
        self.proxy = Some(proxy);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Builder {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Builder {
        self.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Builder {
        self.write_timeout = timeout;
        self
    }

    /// Overrides the async worker pool's core/maximum size (defaults 2/5).
    pub fn async_pool_size(mut self, core: usize, max: usize) -> Builder {
        self.async_core_pool_size = core;
        self.async_max_pool_size = max;
        self
    }

    /// Builds the immutable [`EasyHttp`], opening the cache directory if one
    /// was configured.
    pub fn build(self) -> Result<EasyHttp> {
        let cache = self
            .cache_dir
            .map(|dir| CacheStorage::open(dir, self.cache_max_size))
            .transpose()?;
        let ca_trust = self.ca_trust_pem.map(|pem| parse_ca_trust(&pem)).transpose()?;
        let context = ClientContext {
            cache,
            pool: ConnectionPool::new(),
            interceptors: self.interceptors,
            proxy: self.proxy,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            async_pool: AsyncExecutorPool::new(self.async_core_pool_size, self.async_max_pool_size),
            ca_trust,
        };
        Ok(EasyHttp {
            context: Arc::new(context),
        })
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

/// Parses one or more PEM-encoded certificates supplied to
/// [`Builder::ca_trust`].
fn parse_ca_trust(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut std::io::Cursor::new(pem))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::ssl("failed to parse ca trust pem").with_source(e))
}

#[cfg(test)]
impl ClientContext {
    /// Minimal context for unit tests that need a `ClientContext` but not a
    /// full `EasyHttp::builder()` dance.
    pub(crate) fn for_test() -> Arc<ClientContext> {
        Arc::new(ClientContext {
            cache: None,
            pool: ConnectionPool::new(),
            interceptors: Vec::new(),
            proxy: None,
            connect_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            async_pool: AsyncExecutorPool::new(2, 5),
            ca_trust: None,
        })
    }
}
