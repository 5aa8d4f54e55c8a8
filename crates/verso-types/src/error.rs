use thiserror::Error;

/// Errors produced by object identifier operations.
///
/// A malformed identifier is always a caller bug, never a transient
/// condition — callers must not retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("malformed object id: {reason}")]
    MalformedId { reason: String },
}

impl IdError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self::MalformedId {
            reason: reason.into(),
        }
    }
}
