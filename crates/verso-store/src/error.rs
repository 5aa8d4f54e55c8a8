use thiserror::Error;
use verso_model::ModelError;
use verso_types::ObjId;

/// Errors from backend adapter operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A reference update's expected prior state did not match the stored
    /// state. Always recoverable: re-read the current head, recompute the
    /// logical operation, and retry. Never fatal to the adapter.
    #[error("reference CAS conflict on '{name}'")]
    CasConflict { name: String },

    /// An id collides with different bytes. Fatal: data corruption or a
    /// broken hash discipline upstream.
    #[error("object {id} already exists with different content")]
    ObjMismatch { id: ObjId },

    #[error("object not found: {id}")]
    ObjNotFound { id: ObjId },

    #[error("reference already exists: {name}")]
    RefAlreadyExists { name: String },

    #[error("reference not found: {name}")]
    RefNotFound { name: String },

    /// Transient I/O or connectivity fault from the physical store. The
    /// caller decides retry policy; the core embeds no retry loop.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An adapter was misconfigured or built with a required part missing.
    #[error("adapter configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
