use thiserror::Error;
use uuid::Uuid;

/// Errors from garbage-collection bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GcError {
    /// A phase transition skipped its required predecessor (e.g. expire
    /// before identify succeeded).
    #[error("illegal live-content-set state: {0}")]
    IllegalState(String),

    #[error("live content set not found: {0}")]
    NotFound(Uuid),

    /// Transient fault from the persistence backing the run.
    #[error("gc persistence unavailable: {0}")]
    Backend(String),
}

/// Result alias for GC operations.
pub type GcResult<T> = Result<T, GcError>;
