use thiserror::Error;
use verso_types::IdError;

/// Errors from object model construction and the binary codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A type tag this reader does not know. Fatal: data corruption or a
    /// version skew between writer and reader, never skipped over.
    #[error("unknown object type tag: {0}")]
    UnknownTypeTag(u8),

    /// A serialized object would exceed a caller-supplied size cap. The
    /// caller must split the object (e.g. shard an index) and retry with
    /// smaller pieces; a truncated object is never produced.
    #[error("serialized {kind} of {actual} bytes exceeds the maximum of {limit} bytes")]
    SizeExceeded {
        kind: &'static str,
        limit: usize,
        actual: usize,
    },

    /// Structurally invalid bytes: truncation, bad UTF-8, trailing garbage.
    #[error("malformed object data: {0}")]
    Malformed(String),

    #[error(transparent)]
    Id(#[from] IdError),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
