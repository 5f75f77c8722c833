//! Error types for sequence allocation and ID encoding.
//!
//! [`Error`] is the single error surfaced by the public API. Startup failures
//! ([`Error::Configuration`], [`Error::Persistence`] during bootstrap) are
//! meant to abort initialization; per-request failures ([`Error::NotFound`],
//! [`Error::Timeout`], [`Error::Validation`]) are returned to the caller and
//! may be retried.

use core::time::Duration;

use crate::spec::EncodeError;

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `cell` can produce.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration or category declaration.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// The buffer cache has not been initialized yet.
    #[error("buffer manager is not ready")]
    NotReady,

    /// No buffer is registered for the requested name.
    #[error("no buffer registered for `{name}`")]
    NotFound { name: String },

    /// The active segment was exhausted and no standby segment became ready
    /// within the allocation wait bound.
    #[error("sequence allocation for `{name}` timed out after {waited:?}")]
    Timeout { name: String, waited: Duration },

    /// A field of the ID tuple violated the encoding rules.
    #[error("invalid cell: {0}")]
    Validation(#[from] EncodeError),

    /// The registry store failed or is in an unexpected state.
    #[error("persistence error: {context}")]
    Persistence { context: String },

    /// The manager has been closed.
    #[error("buffer manager has been closed")]
    Closed,
}

impl Error {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(context: impl Into<String>) -> Self {
        Self::Persistence {
            context: context.into(),
        }
    }
}

/// Failure to hand a refill task to the worker pool.
///
/// Never surfaced through [`Error`]: a refill that cannot be scheduled is
/// logged and retried by a later allocation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Every worker is busy and the pool is at its maximum size.
    #[error("refill pool saturated ({size} workers busy)")]
    Rejected { size: usize },

    /// The pool has been closed.
    #[error("refill pool is shut down")]
    Shutdown,

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn refill worker: {context}")]
    Spawn { context: String },
}
