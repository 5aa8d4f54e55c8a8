//! Foundation types for the Verso catalog core.
//!
//! This crate provides the content-addressed object identifier used by every
//! other Verso crate, plus the hash function that mints real identifiers.
//!
//! # Key Types
//!
//! - [`ObjId`] — Variable-length, self-describing object identifier
//! - [`ContentHasher`] — SHA-256 content hashing over canonical bytes
//! - [`EMPTY_OBJ_ID`] — The well-known id of "nothing" (hash of `"empty"`)

pub mod error;
pub mod hasher;
pub mod id;

pub use error::IdError;
pub use hasher::ContentHasher;
pub use id::{ObjId, EMPTY_OBJ_ID};
