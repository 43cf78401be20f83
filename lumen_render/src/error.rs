//! Error types for the Lumen renderer
//!
//! This module defines the error type shared by the core encoder and its
//! backends, plus the `engine_bail!` / `engine_err!` helpers that log an error
//! at the point of origin before it is propagated.

use std::fmt;

/// Result type for Lumen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen renderer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (a device call returned other than success)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (dead handle, failed buffer resolution, foreign backend object)
    InvalidResource(String),

    /// Construction of a device object failed
    InitializationFailed(String),

    /// A mandatory input was missing (attachment, paired texture, live encoder)
    PreconditionFailed(String),

    /// Operation not allowed in the current object state
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::PreconditionFailed(msg) => write!(f, "Precondition failed: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR and build an [`Error`]
///
/// With a bare format string the variant is `BackendError`. Prefix the
/// arguments with a variant path to pick another one.
///
/// # Example
///
/// ```no_run
/// use lumen_render::engine_err;
///
/// let err = engine_err!("lumen::RenderPass", "missing attachment {}", 0);
/// let err = engine_err!(PreconditionFailed, "lumen::RenderPass", "missing attachment {}", 0);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($variant:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::lumen::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {
        $crate::engine_err!(BackendError, $source, $($arg)*)
    };
}

/// Log an ERROR and return early with an [`Error`]
///
/// Accepts the same forms as [`engine_err!`].
#[macro_export]
macro_rules! engine_bail {
    ($variant:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($variant, $source, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
