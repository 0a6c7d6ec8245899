//! `Cache-Control` directive parsing, shared by requests and responses.

use std::time::Duration;

/// The subset of `Cache-Control` directives the engine understands.
///
/// Request-side, these can be set directly on a [`crate::Request::Builder`]
/// as overrides; response-side, they are parsed from the `Cache-Control`
/// response header and stored verbatim on the [`crate::Response`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    /// The response must never be written to, or served from, the cache.
    pub no_store: bool,
    /// A cached response must be revalidated with the origin before use.
    pub no_cache: bool,
    /// Reject a cached response older than this.
    pub max_age: Option<Duration>,
}

impl CacheControl {
    /// Parses a `Cache-Control` header value into its known directives.
    /// Unrecognized directives are ignored rather than rejected, matching
    /// the conservative-parsing posture HTTP caches take in practice.
    pub fn parse(value: &str) -> CacheControl {
        let mut cc = CacheControl::default();
        for directive in value.split(',') {
            let directive = directive.trim();
            let (name, arg) = match directive.split_once('=') {
                Some((n, a)) => (n.trim(), Some(a.trim().trim_matches('"'))),
                None => (directive, None),
            };
            match name.to_ascii_lowercase().as_str() {
                "no-store" => cc.no_store = true,
                "no-cache" => cc.no_cache = true,
                "max-age" => {
                    if let Some(secs) = arg.and_then(|a| a.parse::<u64>().ok()) {
                        cc.max_age = Some(Duration::from_secs(secs));
                    }
                }
                _ => {}
            }
        }
        cc
    }

    /// True if a response carrying this directive set is eligible to be
    /// written to the cache at all.
    pub fn is_storable(&self) -> bool {
        !self.no_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_directives() {
        let cc = CacheControl::parse("no-cache, max-age=60");
        assert!(cc.no_cache);
        assert!(!cc.no_store);
        assert_eq!(cc.max_age, Some(Duration::from_secs(60)));
    }

    #[test]
    fn ignores_unknown_directives() {
        let cc = CacheControl::parse("private, must-revalidate");
        assert_eq!(cc, CacheControl::default());
    }
}
