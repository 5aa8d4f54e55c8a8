use verso_model::{Obj, Reference};
use verso_types::ObjId;

use crate::error::StoreResult;

/// One logical commit against a reference: the new content objects plus the
/// pointer swing from the expected current head to the new head.
#[derive(Clone, Debug)]
pub struct CommitAttempt {
    pub reference_name: String,
    /// The head the caller computed against. If the stored head differs at
    /// commit time, the attempt fails with a CAS conflict.
    pub expected_head: ObjId,
    /// New objects this commit introduces (the commit object itself, index
    /// segments, content values, ...).
    pub objs: Vec<Obj>,
    /// The new head, normally the id of the commit object in `objs`.
    pub new_head: ObjId,
}

/// The adapter contract shared by both backend families.
///
/// Implementations must be `Send + Sync`; many callers read and write
/// concurrently against one adapter instance. Object writes are safe under
/// unrestricted concurrency (content-addressed, idempotent); reference
/// updates are serialized solely by their CAS.
pub trait BackendAdapter: Send + Sync {
    /// Persist one object, keyed by its id. Write-once: returns `true` if
    /// newly persisted, `false` if an identical object already exists.
    /// The same id with different bytes is a protocol violation
    /// ([`StoreError::ObjMismatch`](crate::StoreError::ObjMismatch)).
    fn store_obj(&self, obj: &Obj) -> StoreResult<bool>;

    /// Persist a batch of objects; one event is emitted for the whole batch.
    fn store_objs(&self, objs: &[Obj]) -> StoreResult<Vec<bool>>;

    /// Fetch an object by id.
    fn fetch_obj(&self, id: &ObjId) -> StoreResult<Obj>;

    /// Whether an object exists.
    fn obj_exists(&self, id: &ObjId) -> StoreResult<bool>;

    /// Create a reference with an initial head. Fails with
    /// `RefAlreadyExists` when the name is taken (including by a
    /// soft-deleted reference that has not been purged).
    fn create_reference(&self, name: &str, pointer: ObjId) -> StoreResult<Reference>;

    /// Fetch a reference by name. Soft-deleted references read as absent.
    fn fetch_reference(&self, name: &str) -> StoreResult<Reference>;

    /// All live (non-deleted) references.
    fn fetch_references(&self) -> StoreResult<Vec<Reference>>;

    /// Swing the reference pointer: a single compare-and-swap from
    /// `expected`'s full state to the same state with `new_pointer`.
    /// Returns the reference's new state on success.
    fn update_reference_pointer(
        &self,
        expected: &Reference,
        new_pointer: ObjId,
    ) -> StoreResult<Reference>;

    /// Soft-delete a reference (CAS on the deleted flag). The returned
    /// state is what `purge_reference` expects.
    fn mark_reference_as_deleted(&self, expected: &Reference) -> StoreResult<Reference>;

    /// Hard-remove a soft-deleted reference row, CAS-guarded on `expected`.
    /// `expected` must carry the deleted flag (the state returned by
    /// `mark_reference_as_deleted`); purging a live state is rejected.
    fn purge_reference(&self, expected: &Reference) -> StoreResult<()>;

    /// Perform one logical commit; see [`CommitAttempt`]. On a CAS conflict
    /// the caller must re-read the current head, recompute, and retry —
    /// any objects already written are harmless content-addressed orphans.
    fn commit(&self, attempt: CommitAttempt) -> StoreResult<Reference>;
}
