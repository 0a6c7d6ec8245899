//! Forward proxy configuration.
//!
//! Only plain `host:port` forwarding is modeled; negotiating a proxy
//! protocol beyond CONNECT tunneling is out of scope (see spec Non-goals).

use std::fmt;

/// An HTTP forward proxy, identified by host and port.
///
/// Two proxies are equal iff both their host and port match.
#[derive(Debug, Clone, Hash)]
pub struct Proxy {
    host: String,
    port: u16,
}

impl Proxy {
    /// Creates a new proxy pointing at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Proxy {
        Proxy {
            host: host.into(),
            port,
        }
    }

    /// The proxy's host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The proxy's port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Proxy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_host_and_port() {
        let a = Proxy::new("proxy.example.com", 8080);
        let b = Proxy::new("proxy.example.com", 8080);
        let c = Proxy::new("proxy.example.com", 8081);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_is_host_colon_port() {
        let p = Proxy::new("proxy.example.com", 8080);
        assert_eq!(p.to_string(), "proxy.example.com:8080");
    }
}
