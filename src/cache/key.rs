//! Deterministic cache-key fingerprinting.
//!
//! The key is a function of (method, URL, varying-request-headers) per the
//! data-model invariant: identical fingerprints must match, and the digest
//! doubles as the on-disk payload file name, so it must be both stable
//! across process restarts and filesystem-safe.

use sha2::{Digest, Sha256};

use crate::request::Request;

/// Request headers that participate in the cache-key fingerprint.
///
/// Only headers that can legitimately vary the representation returned for
/// the same URL are included; arbitrary headers (e.g. a tracing request id)
/// must not fragment the cache.
const VARYING_HEADERS: &[&str] = &["accept", "accept-encoding", "accept-language"];

/// Computes the cache-key for `request`: a lowercase hex SHA-256 digest of
/// the method, URL, and the [`VARYING_HEADERS`] subset of request headers.
pub fn fingerprint(request: &Request) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.method().as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(request.url().as_str().as_bytes());
    hasher.update(b"\n");
    for name in VARYING_HEADERS {
        if let Some(value) = request.headers().get(*name) {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use http::Method;
    use url::Url;

    use super::*;

    fn req(url: &str) -> Request {
        Request::builder(Url::parse(url).unwrap())
            .method(Method::GET)
            .build()
    }

    #[test]
    fn identical_requests_share_a_fingerprint() {
        let a = req("http://127.0.0.1:9000/path?a=1");
        let b = req("http://127.0.0.1:9000/path?a=1");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_urls_have_different_fingerprints() {
        let a = req("http://127.0.0.1:9000/path?a=1");
        let b = req("http://127.0.0.1:9000/path?a=2");
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_hex() {
        let a = req("http://127.0.0.1:9000/path");
        let fp = fingerprint(&a);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
