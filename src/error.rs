//! The core error type and its taxonomy.
//!
//! Mirrors the shape of the teacher's `wreq::Error`: a boxed `Inner` carrying
//! a private `Kind`, an optional source, and predicate methods for callers
//! that want to branch on the failure category without matching on `Kind`
//! directly (`Kind` is intentionally not exported).

use std::{error::Error as StdError, fmt};

/// A `Result` alias where the `Err` case is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type used for dynamic error chaining.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Reserved numeric code ranges, one per [`Kind`]. Mirrors the C++ source's
/// convention of tagging each exception kind with a stable integer so
/// bindings in other languages can match on it without string comparison.
mod codes {
    pub const ILLEGAL_STATE: i32 = 100600;
    pub const ILLEGAL_ARGUMENT: i32 = 100700;
    pub const EXECUTION: i32 = 100800;
    pub const TIMEOUT: i32 = 100900;
    pub const SSL: i32 = 101000;
}

/// The error type for all fallible operations in this crate.
///
/// Every error carries a [`Kind`], an optional human-readable message, an
/// optional chained [`BoxError`] source, and a numeric `code`. The `code` is
/// stable per [`Kind`] unless explicitly overridden (`execute_async(None)`
/// uses `100700`, matching the documented `IllegalArgument` contract at the
/// `Call` boundary).
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    code: i32,
    message: String,
    source: Option<BoxError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    IllegalState,
    IllegalArgument,
    Execution,
    Timeout,
    Ssl,
}

impl Error {
    pub(crate) fn new(kind: Kind, message: impl Into<String>) -> Error {
        let code = match kind {
            Kind::IllegalState => codes::ILLEGAL_STATE,
            Kind::IllegalArgument => codes::ILLEGAL_ARGUMENT,
            Kind::Execution => codes::EXECUTION,
            Kind::Timeout => codes::TIMEOUT,
            Kind::Ssl => codes::SSL,
        };
        Error {
            inner: Box::new(Inner {
                kind,
                code,
                message: message.into(),
                source: None,
            }),
        }
    }

    pub(crate) fn with_source<E>(mut self, source: E) -> Error
    where
        E: Into<BoxError>,
    {
        self.inner.source = Some(source.into());
        self
    }

    /// Wrong lifecycle transition (e.g. a second `execute()`).
    pub fn illegal_state(message: impl Into<String>) -> Error {
        Error::new(Kind::IllegalState, message)
    }

    /// Malformed input detected at an API boundary (e.g. a null callback).
    pub fn illegal_argument(message: impl Into<String>) -> Error {
        Error::new(Kind::IllegalArgument, message)
    }

    /// Generic execution failure: network I/O, retry exhaustion, cancellation.
    pub fn execution(message: impl Into<String>) -> Error {
        Error::new(Kind::Execution, message)
    }

    /// A connect/read/write deadline was exceeded.
    pub fn timeout(message: impl Into<String>) -> Error {
        Error::new(Kind::Timeout, message)
    }

    /// A TLS handshake or certificate verification failure.
    pub fn ssl(message: impl Into<String>) -> Error {
        Error::new(Kind::Ssl, message)
    }

    /// The reserved numeric code for this error's kind.
    pub fn code(&self) -> i32 {
        self.inner.code
    }

    /// Returns true if this error is an `IllegalState` violation.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self.inner.kind, Kind::IllegalState)
    }

    /// Returns true if this error is an `IllegalArgument` violation.
    pub fn is_illegal_argument(&self) -> bool {
        matches!(self.inner.kind, Kind::IllegalArgument)
    }

    /// Returns true if this error is a generic `Execution` failure.
    pub fn is_execution(&self) -> bool {
        matches!(self.inner.kind, Kind::Execution)
    }

    /// Returns true if this error is a `Timeout`.
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout)
    }

    /// Returns true if this error is an `Ssl` failure.
    pub fn is_ssl(&self) -> bool {
        matches!(self.inner.kind, Kind::Ssl)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("easyhttp::Error");
        builder.field("kind", &self.inner.kind);
        builder.field("code", &self.inner.code);
        builder.field("message", &self.inner.message);
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.message)?;
        if let Some(e) = &self.inner.source {
            write!(f, ": {e}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

/// Maps a lower-level I/O/connector error into the public taxonomy,
/// per the propagation policy: timeouts and TLS failures keep their
/// distinct kind, everything else becomes `Execution`.
pub(crate) fn map_transport_error(e: impl Into<BoxError>) -> Error {
    let e = e.into();
    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        if io.kind() == std::io::ErrorKind::TimedOut {
            return Error::timeout("operation timed out").with_source(e);
        }
    }
    if e.downcast_ref::<rustls::Error>().is_some() {
        return Error::ssl("tls handshake failed").with_source(e);
    }
    Error::execution("error sending request").with_source(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn is_send_and_sync() {
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn illegal_argument_has_documented_code() {
        let err = Error::illegal_argument("ResponseCallback can not be null.");
        assert_eq!(err.code(), 100700);
        assert!(err.is_illegal_argument());
        assert!(!err.is_execution());
    }

    #[test]
    fn display_includes_source() {
        let io = std::io::Error::other("boom");
        let err = Error::execution("error sending request").with_source(io);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn retry_exhaustion_message_matches_executor_contract() {
        let err = Error::execution("too many retry request. 5 times.");
        assert!(err.is_execution());
        assert_eq!(err.to_string(), "too many retry request. 5 times.");
    }
}
