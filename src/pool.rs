//! The connection pool.
//!
//! Grounded on the original `ConnectionPoolInternal`/`ConnectionInternal`
//! pair: connections are keyed by (scheme, host, port, proxy), and the
//! engine decides whether a cancel removes a pooled connection or leaves it
//! be, based entirely on whether the response body had already reached EOF
//! and been closed (see `CallWithConnectionPoolAndCancelIntegrationTest`).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use http::uri::Scheme;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::proxy::Proxy;

/// Identifies a pooled connection's endpoint: all requests sharing a key
/// are eligible to reuse the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub proxy: Option<Proxy>,
}

impl EndpointKey {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16, proxy: Option<Proxy>) -> EndpointKey {
        EndpointKey {
            scheme: scheme.to_string(),
            host: host.into(),
            port,
            proxy,
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.proxy {
            Some(proxy) => write!(f, "{}://{}:{} via {}", self.scheme, self.host, self.port, proxy),
            None => write!(f, "{}://{}:{}", self.scheme, self.host, self.port),
        }
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A pooled transport, identified by the endpoint it connects to.
///
/// The transport itself (the live `hyper::client::conn::http1::SendRequest`)
/// is owned by the engine; the pool only tracks identity and membership, so
/// it never needs to reach into in-flight I/O to answer `contains`/`remove`.
pub struct Connection {
    id: u64,
    key: EndpointKey,
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }
}

/// The shared pool of [`Connection`]s for a client context.
///
/// Mutations are serialized behind a single lock; membership checks are by
/// connection id, not by the underlying transport, so a connection can be
/// asked "are you still pooled?" without holding the transport lock.
/// `idle_by_key` tracks only the ids currently eligible for reuse — an
/// in-use connection is in `connections` but absent from `idle_by_key`
/// until `release` puts it back.
pub struct ConnectionPool {
    connections: Mutex<HashMap<u64, Arc<Connection>>>,
    idle_by_key: AsyncMutex<HashMap<EndpointKey, Vec<u64>>>,
}

impl ConnectionPool {
    pub fn new() -> ConnectionPool {
        ConnectionPool {
            connections: Mutex::new(HashMap::new()),
            idle_by_key: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Hands back an idle connection for `key` if one is pooled, otherwise
    /// mints a fresh one. Either way the returned handle is in-use until a
    /// matching `release`.
    pub async fn acquire(&self, key: EndpointKey) -> Arc<Connection> {
        let idle_id = {
            let mut idle_by_key = self.idle_by_key.lock().await;
            match idle_by_key.get_mut(&key) {
                Some(ids) => ids.pop(),
                None => None,
            }
        };
        if let Some(id) = idle_id {
            if let Some(connection) = self.connections.lock().get(&id).cloned() {
                return connection;
            }
        }

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let connection = Arc::new(Connection {
            id,
            key: key.clone(),
        });
        self.connections.lock().insert(id, connection.clone());
        connection
    }

    /// Returns a connection to the pool for reuse by a later `acquire` for
    /// the same endpoint. A no-op if it was already removed (e.g. by a
    /// concurrent `remove`).
    pub async fn release(&self, connection: &Arc<Connection>) {
        if !self.connections.lock().contains_key(&connection.id) {
            return;
        }
        let mut idle_by_key = self.idle_by_key.lock().await;
        let ids = idle_by_key.entry(connection.key.clone()).or_default();
        if !ids.contains(&connection.id) {
            ids.push(connection.id);
        }
    }

    /// Removes `connection` from the pool: it is no longer considered safe
    /// to reuse (e.g. the wire state is indeterminate after a cancel
    /// mid-stream).
    pub async fn remove(&self, connection: &Arc<Connection>) {
        self.connections.lock().remove(&connection.id);
        let mut idle_by_key = self.idle_by_key.lock().await;
        if let Some(ids) = idle_by_key.get_mut(&connection.key) {
            ids.retain(|id| *id != connection.id);
            if ids.is_empty() {
                idle_by_key.remove(&connection.key);
            }
        }
    }

    /// Total number of connections currently pooled, across all endpoints.
    pub fn total_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// True if `connection` is still pooled.
    pub fn contains(&self, connection: &Arc<Connection>) -> bool {
        self.connections.lock().contains_key(&connection.id)
    }
}

impl Default for ConnectionPool {
    fn default() -> ConnectionPool {
        ConnectionPool::new()
    }
}
