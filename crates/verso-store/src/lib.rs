//! Backend adapters for the Verso catalog core.
//!
//! This crate persists [`Obj`](verso_model::Obj) bytes keyed by their
//! content-addressed id and provides the compare-and-swap protocol for
//! [`Reference`](verso_model::Reference) updates, uniformly across physical
//! stores with very different native guarantees.
//!
//! # The two backend families
//!
//! - [`TxBackend`] — stores with native multi-key transactions.
//!   [`TransactionalAdapter`] wraps each logical operation (write objects +
//!   update reference) in one transaction and maps a backend conflict to a
//!   CAS-failure outcome.
//! - [`KvBackend`] — stores with only single-key atomic primitives.
//!   [`NonTransactionalAdapter`] synthesizes atomicity with the two-phase
//!   "write-then-swing-the-pointer" protocol: (1) write all new content
//!   objects (content-addressed, idempotent, safe to retry), then (2) one
//!   atomic compare-and-swap on the reference row. A failed phase 2 merely
//!   orphans phase-1 writes — harmless, content-addressed garbage.
//!
//! # Design Rules
//!
//! 1. Objects are write-once: re-writing an identical id with identical
//!    bytes is a no-op; the same id with different bytes fails loudly
//!    ([`StoreError::ObjMismatch`]) rather than corrupting state.
//! 2. Reference updates are the sole serialization point. Concurrent CAS
//!    attempts race; exactly one wins; losers observe
//!    [`StoreError::CasConflict`] and must re-read and retry. The adapter
//!    never retries, merges, or reorders on its own.
//! 3. No lock is held across the two phases — correctness relies solely on
//!    the atomicity of the final CAS.
//! 4. Event consumers are notified after objects are durably written and
//!    after references change state; the adapter knows nothing about them.

pub mod builder;
pub mod config;
pub mod error;
pub mod events;
pub mod kv;
pub mod memory;
pub mod traits;
pub mod tx;

pub(crate) mod keys;

pub use builder::AdapterBuilder;
pub use config::AdapterConfig;
pub use error::{StoreError, StoreResult};
pub use events::{AdapterEvent, AdapterEventConsumer, NoopEventConsumer, ReferenceChange};
pub use kv::{KvBackend, NonTransactionalAdapter};
pub use memory::{InMemoryKvBackend, InMemoryTxBackend};
pub use traits::{BackendAdapter, CommitAttempt};
pub use tx::{TransactionalAdapter, TxBackend, TxHandle, TxOutcome};
