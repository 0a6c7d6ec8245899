//! Thin wrappers over `tracing` macros.
//!
//! Unlike the teacher crate (which hides its tracing calls behind an
//! opt-in `tracing` cargo feature because it's instrumenting optional
//! browser-emulation internals), logging here is ambient: the engine,
//! executor, and cache store always emit through these.

macro_rules! trace {
    ($($arg:tt)+) => {
        ::tracing::trace!($($arg)+)
    }
}

macro_rules! debug {
    ($($arg:tt)+) => {
        ::tracing::debug!($($arg)+)
    }
}

macro_rules! warn {
    ($($arg:tt)+) => {
        ::tracing::warn!($($arg)+)
    }
}
