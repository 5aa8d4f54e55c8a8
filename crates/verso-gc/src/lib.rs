//! Live-content-set bookkeeping for Verso garbage collection runs.
//!
//! A garbage collection run has two phases: *identify* walks the commit DAG
//! and records every content id still reachable, then *expire* lists
//! storage, diffs it against the identified-live set, and records the files
//! to delete. This crate owns the durable record of one such run — the
//! [`LiveContentSet`] — and its strict state machine:
//!
//! ```text
//! IdentifyInProgress ── IdentifySuccess ── ExpiryInProgress ── ExpirySuccess
//!         │                                       │
//!         └── IdentifyFailed                      └── ExpiryFailed
//! ```
//!
//! The set never performs physical deletion: its [`FileDeleter`] only
//! records intent (deferred deletes), fetched later in batches by base
//! location. Phase failures are captured as durable message strings, never
//! live error values, so a failed run stays inspectable after the process
//! is gone.
//!
//! All streaming reads are [`ScopedStream`]s over a backend cursor: the
//! cursor is released exactly once when the stream is dropped, whether it
//! was fully consumed, partially consumed, or abandoned on an error path.

pub mod deleter;
pub mod error;
pub mod live_set;
pub mod memory;
pub mod persistence;
pub mod stream;
pub mod types;

pub use deleter::{DeferringFileDeleter, FileDeleter};
pub use error::{GcError, GcResult};
pub use live_set::{LiveContentSet, LiveSetRecord, Status};
pub use memory::InMemoryLiveSetPersistence;
pub use persistence::LiveSetPersistence;
pub use stream::ScopedStream;
pub use types::{ContentReference, DeleteResult, DeleteSummary, FileReference};
