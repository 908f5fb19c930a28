//! Unified error type.

use thiserror::Error;

/// Boxed error returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by ware's fallible operations.
///
/// Every variant is fatal to the run that produced it. There is no retry and
/// no partial success: a run either completes (normally or by early stop) or
/// aborts with one of these.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler declared a parameter whose type is bound nowhere in the
    /// registry chain.
    #[error("missing binding for `{type_name}`")]
    MissingBinding { type_name: &'static str },

    /// A handler returned `Err`.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// A later handler failed; reported to handlers waiting in `next()`.
    /// The top-level `run()` replaces it with the original error.
    #[error("chain aborted by a later handler")]
    Aborted,

    #[error("invalid cursor {cursor} for chain of {len} handlers")]
    CursorOutOfRange { cursor: usize, len: usize },
}

impl Error {
    /// Wraps a handler error, keeping it as-is when it already is an [`Error`].
    pub(crate) fn from_handler(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(err) => *err,
            Err(err) => Self::Handler(err),
        }
    }

    pub(crate) fn missing<T: ?Sized>() -> Self {
        Self::MissingBinding { type_name: std::any::type_name::<T>() }
    }
}
