//! Typed object model and canonical binary codec for the Verso catalog core.
//!
//! Every piece of versioned state in Verso is an immutable [`Obj`]: a commit,
//! a tag, a named-reference snapshot, a content value, a string blob, or a
//! key-index (segment). Objects are identified by the SHA-256 hash of their
//! canonical serialized bytes, so logically identical objects always share
//! one identity and are stored exactly once.
//!
//! The one mutable thing in the system is the [`Reference`]: a named pointer
//! into the commit DAG, advanced only by compare-and-swap.
//!
//! # Canonical form
//!
//! The codec in [`codec`] is a closed tagged-union encoder. Its two laws:
//!
//! 1. `deserialize(serialize(o)) == o` structurally, and
//! 2. `serialize(deserialize(serialize(o))) == serialize(o)` byte-for-byte.
//!
//! Unknown type tags are rejected, never skipped — an unrecognized tag means
//! data corruption or writer/reader version skew.

pub mod codec;
pub mod error;
pub mod headers;
pub mod obj;
pub mod reference;

pub use codec::{deserialize_obj, deserialize_reference, serialize_obj, serialize_reference};
pub use error::{ModelError, ModelResult};
pub use headers::CommitHeaders;
pub use obj::{
    CommitObj, Compression, ContentValueObj, IndexObj, IndexSegmentsObj, Obj, RefObj,
    StringDataObj, TagObj,
};
pub use reference::Reference;
