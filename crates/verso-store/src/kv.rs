//! The non-transactional family: key/value stores with single-key atomic
//! primitives only.
//!
//! [`NonTransactionalAdapter`] provides transaction-like guarantees for the
//! append-only commit DAG with the two-phase write-then-swing protocol:
//! content objects first (idempotent), then one atomic compare-and-swap on
//! the reference row. The window between the phases is intentionally
//! lock-free; correctness relies solely on the atomicity of the final CAS.

use std::sync::Arc;

use tracing::debug;
use verso_model::{deserialize_obj, deserialize_reference, serialize_reference, Obj, Reference};
use verso_types::ObjId;

use crate::config::AdapterConfig;
use crate::error::{StoreError, StoreResult};
use crate::events::{AdapterEvent, AdapterEventConsumer, ReferenceChange};
use crate::keys::{encode_obj, now_micros, obj_key, ref_key, ref_prefix};
use crate::traits::{BackendAdapter, CommitAttempt};

/// Contract a non-transactional physical store must satisfy.
///
/// Every operation is atomic for its single key; nothing spans keys. That
/// is the whole contract — the adapter builds multi-object semantics on top.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Atomically insert `value` unless `key` is present. Returns `true`
    /// if the insert happened.
    fn put_if_absent(&self, key: &str, value: Vec<u8>) -> StoreResult<bool>;

    /// Atomically replace the value at `key` if it currently equals
    /// `expected`. Returns `true` on the swap.
    fn compare_and_put(&self, key: &str, expected: &[u8], value: Vec<u8>) -> StoreResult<bool>;

    /// Atomically remove the value at `key` if it currently equals
    /// `expected`. Returns `true` on the removal.
    fn compare_and_delete(&self, key: &str, expected: &[u8]) -> StoreResult<bool>;

    /// All key/value pairs whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;
}

/// Adapter over a [`KvBackend`].
pub struct NonTransactionalAdapter<B> {
    config: AdapterConfig,
    backend: B,
    events: Arc<dyn AdapterEventConsumer>,
}

impl<B> std::fmt::Debug for NonTransactionalAdapter<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonTransactionalAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: KvBackend> NonTransactionalAdapter<B> {
    pub(crate) fn new(
        config: AdapterConfig,
        backend: B,
        events: Arc<dyn AdapterEventConsumer>,
    ) -> Self {
        Self {
            config,
            backend,
            events,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Write-once insert of one object; no event emission here so batch
    /// callers can aggregate.
    fn store_obj_quiet(&self, obj: &Obj) -> StoreResult<bool> {
        let bytes = encode_obj(&self.config, obj)?;
        let key = obj_key(&self.config.repo_id, obj.id());
        if self.backend.put_if_absent(&key, bytes.clone())? {
            return Ok(true);
        }
        match self.backend.get(&key)? {
            Some(existing) if existing == bytes => Ok(false),
            Some(_) => Err(StoreError::ObjMismatch {
                id: obj.id().clone(),
            }),
            // The row vanished between the failed insert and the read;
            // only a concurrent (GC) delete does that.
            None => Err(StoreError::BackendUnavailable(format!(
                "object {} disappeared during write",
                obj.id()
            ))),
        }
    }

    /// Fetch the raw reference row, including soft-deleted rows.
    fn fetch_reference_row(&self, name: &str) -> StoreResult<Option<Reference>> {
        let key = ref_key(&self.config.repo_id, name);
        match self.backend.get(&key)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(deserialize_reference(&bytes)?)),
        }
    }

    /// One CAS on a reference row from `expected` to `next`.
    fn swap_reference(&self, expected: &Reference, next: &Reference) -> StoreResult<()> {
        let key = ref_key(&self.config.repo_id, &expected.name);
        let expected_bytes = serialize_reference(expected)?;
        let next_bytes = serialize_reference(next)?;
        if self.backend.compare_and_put(&key, &expected_bytes, next_bytes)? {
            Ok(())
        } else {
            debug!(name = %expected.name, "reference CAS lost the race");
            Err(StoreError::CasConflict {
                name: expected.name.clone(),
            })
        }
    }
}

impl<B: KvBackend> BackendAdapter for NonTransactionalAdapter<B> {
    fn store_obj(&self, obj: &Obj) -> StoreResult<bool> {
        let stored = self.store_obj_quiet(obj)?;
        if stored {
            self.events.accept(AdapterEvent::ObjsPersisted {
                ids: vec![obj.id().clone()],
            });
        }
        Ok(stored)
    }

    fn store_objs(&self, objs: &[Obj]) -> StoreResult<Vec<bool>> {
        let mut results = Vec::with_capacity(objs.len());
        let mut persisted = Vec::new();
        for obj in objs {
            let stored = self.store_obj_quiet(obj)?;
            if stored {
                persisted.push(obj.id().clone());
            }
            results.push(stored);
        }
        if !persisted.is_empty() {
            debug!(count = persisted.len(), "objects persisted");
            self.events
                .accept(AdapterEvent::ObjsPersisted { ids: persisted });
        }
        Ok(results)
    }

    fn fetch_obj(&self, id: &ObjId) -> StoreResult<Obj> {
        let key = obj_key(&self.config.repo_id, id);
        let bytes = self
            .backend
            .get(&key)?
            .ok_or_else(|| StoreError::ObjNotFound { id: id.clone() })?;
        Ok(deserialize_obj(id, &bytes)?)
    }

    fn obj_exists(&self, id: &ObjId) -> StoreResult<bool> {
        let key = obj_key(&self.config.repo_id, id);
        Ok(self.backend.get(&key)?.is_some())
    }

    fn create_reference(&self, name: &str, pointer: ObjId) -> StoreResult<Reference> {
        let reference = Reference::new(name, pointer.clone(), now_micros(), None);
        let key = ref_key(&self.config.repo_id, name);
        let bytes = serialize_reference(&reference)?;
        if !self.backend.put_if_absent(&key, bytes)? {
            return Err(StoreError::RefAlreadyExists {
                name: name.to_string(),
            });
        }
        self.events.accept(AdapterEvent::ReferenceChanged {
            name: name.to_string(),
            change: ReferenceChange::Created { pointer },
        });
        Ok(reference)
    }

    fn fetch_reference(&self, name: &str) -> StoreResult<Reference> {
        match self.fetch_reference_row(name)? {
            Some(reference) if !reference.deleted => Ok(reference),
            _ => Err(StoreError::RefNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn fetch_references(&self) -> StoreResult<Vec<Reference>> {
        let mut references = Vec::new();
        for (_, bytes) in self
            .backend
            .scan_prefix(&ref_prefix(&self.config.repo_id))?
        {
            let reference = deserialize_reference(&bytes)?;
            if !reference.deleted {
                references.push(reference);
            }
        }
        Ok(references)
    }

    fn update_reference_pointer(
        &self,
        expected: &Reference,
        new_pointer: ObjId,
    ) -> StoreResult<Reference> {
        let next = expected.advanced(new_pointer.clone());
        self.swap_reference(expected, &next)?;
        self.events.accept(AdapterEvent::ReferenceChanged {
            name: expected.name.clone(),
            change: ReferenceChange::PointerUpdated {
                from: expected.pointer.clone(),
                to: new_pointer,
            },
        });
        Ok(next)
    }

    fn mark_reference_as_deleted(&self, expected: &Reference) -> StoreResult<Reference> {
        let next = expected.as_deleted();
        self.swap_reference(expected, &next)?;
        self.events.accept(AdapterEvent::ReferenceChanged {
            name: expected.name.clone(),
            change: ReferenceChange::Deleted,
        });
        Ok(next)
    }

    fn purge_reference(&self, expected: &Reference) -> StoreResult<()> {
        // Only soft-deleted rows may be purged; a live state means the
        // caller skipped mark_reference_as_deleted.
        if !expected.deleted {
            return Err(StoreError::CasConflict {
                name: expected.name.clone(),
            });
        }
        let key = ref_key(&self.config.repo_id, &expected.name);
        let expected_bytes = serialize_reference(expected)?;
        if !self.backend.compare_and_delete(&key, &expected_bytes)? {
            return Err(StoreError::CasConflict {
                name: expected.name.clone(),
            });
        }
        self.events.accept(AdapterEvent::ReferenceChanged {
            name: expected.name.clone(),
            change: ReferenceChange::Purged,
        });
        Ok(())
    }

    fn commit(&self, attempt: CommitAttempt) -> StoreResult<Reference> {
        // Phase 1: content objects. Content-addressed and idempotent, so a
        // retry after a lost CAS simply converges on the same rows.
        self.store_objs(&attempt.objs)?;

        // Phase 2: swing the pointer. No lock spans the phases; a conflict
        // here leaves phase-1 writes as collectable orphans.
        let current = self.fetch_reference(&attempt.reference_name)?;
        if current.pointer != attempt.expected_head {
            debug!(
                name = %attempt.reference_name,
                expected = %attempt.expected_head,
                actual = %current.pointer,
                "commit lost against a newer head"
            );
            return Err(StoreError::CasConflict {
                name: attempt.reference_name,
            });
        }
        self.update_reference_pointer(&current, attempt.new_head)
    }
}

#[cfg(test)]
mod tests {
    use verso_model::{CommitHeaders, CommitObj, ContentValueObj};
    use verso_types::{ContentHasher, EMPTY_OBJ_ID};

    use super::*;
    use crate::events::test_support::RecordingConsumer;
    use crate::events::NoopEventConsumer;
    use crate::memory::InMemoryKvBackend;

    fn adapter() -> NonTransactionalAdapter<InMemoryKvBackend> {
        NonTransactionalAdapter::new(
            AdapterConfig::default(),
            InMemoryKvBackend::new(),
            Arc::new(NoopEventConsumer),
        )
    }

    fn recording_adapter() -> (
        NonTransactionalAdapter<InMemoryKvBackend>,
        Arc<RecordingConsumer>,
    ) {
        let consumer = Arc::new(RecordingConsumer::default());
        let adapter = NonTransactionalAdapter::new(
            AdapterConfig::default(),
            InMemoryKvBackend::new(),
            consumer.clone(),
        );
        (adapter, consumer)
    }

    fn commit_obj(seq: u64, message: &str, parent: ObjId) -> Obj {
        Obj::Commit(
            CommitObj::build(seq, 42, message, CommitHeaders::new(), vec![parent], vec![])
                .unwrap(),
        )
    }

    fn value_obj(content_id: &str, data: &[u8]) -> Obj {
        Obj::ContentValue(ContentValueObj::build(content_id, 0, data.to_vec()).unwrap())
    }

    #[test]
    fn store_and_fetch_roundtrip() {
        let adapter = adapter();
        let obj = value_obj("cid-1", b"payload");
        assert!(adapter.store_obj(&obj).unwrap());
        assert!(adapter.obj_exists(obj.id()).unwrap());
        assert_eq!(adapter.fetch_obj(obj.id()).unwrap(), obj);
    }

    #[test]
    fn rewrite_of_identical_object_is_a_noop() {
        let adapter = adapter();
        let obj = value_obj("cid-1", b"payload");
        assert!(adapter.store_obj(&obj).unwrap());
        assert!(!adapter.store_obj(&obj).unwrap());
    }

    #[test]
    fn id_collision_with_different_bytes_fails_loudly() {
        let adapter = adapter();
        let a = value_obj("cid-1", b"payload");
        // Same storage key, different bytes: a synthetic object whose id was
        // forced to collide.
        let b = match value_obj("cid-2", b"other") {
            Obj::ContentValue(mut o) => {
                o.id = a.id().clone();
                Obj::ContentValue(o)
            }
            _ => unreachable!(),
        };
        adapter.store_obj(&a).unwrap();
        let err = adapter.store_obj(&b).unwrap_err();
        assert!(matches!(err, StoreError::ObjMismatch { .. }));
    }

    #[test]
    fn fetch_missing_obj_is_not_found() {
        let adapter = adapter();
        let id = ContentHasher::hash(b"never stored");
        assert!(matches!(
            adapter.fetch_obj(&id).unwrap_err(),
            StoreError::ObjNotFound { .. }
        ));
    }

    #[test]
    fn size_caps_are_enforced_at_store_time() {
        let consumer = Arc::new(NoopEventConsumer);
        let config = AdapterConfig {
            max_string_data_size: 4,
            ..AdapterConfig::default()
        };
        let adapter =
            NonTransactionalAdapter::new(config, InMemoryKvBackend::new(), consumer);
        let obj = Obj::StringData(
            verso_model::StringDataObj::build(
                "t",
                verso_model::Compression::None,
                None,
                vec![],
                vec![0u8; 5],
            )
            .unwrap(),
        );
        assert!(matches!(
            adapter.store_obj(&obj).unwrap_err(),
            StoreError::Model(verso_model::ModelError::SizeExceeded { .. })
        ));
    }

    #[test]
    fn cas_sequence_succeeds_conflicts_then_succeeds() {
        let adapter = adapter();
        let h1 = EMPTY_OBJ_ID;
        let h2 = ContentHasher::hash(b"c2");
        let h3 = ContentHasher::hash(b"c3");

        let at_h1 = adapter.create_reference("refs/heads/main", h1.clone()).unwrap();
        let at_h2 = adapter
            .update_reference_pointer(&at_h1, h2.clone())
            .unwrap();
        assert_eq!(at_h2.pointer, h2);

        // A second writer still expecting h1 loses.
        let err = adapter
            .update_reference_pointer(&at_h1, h3.clone())
            .unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));

        // Retrying from the fresh state wins.
        let fresh = adapter.fetch_reference("refs/heads/main").unwrap();
        assert_eq!(fresh.pointer, h2);
        let at_h3 = adapter.update_reference_pointer(&fresh, h3.clone()).unwrap();
        assert_eq!(at_h3.pointer, h3);
    }

    #[test]
    fn create_duplicate_reference_fails() {
        let adapter = adapter();
        adapter.create_reference("refs/heads/main", EMPTY_OBJ_ID).unwrap();
        let err = adapter
            .create_reference("refs/heads/main", EMPTY_OBJ_ID)
            .unwrap_err();
        assert!(matches!(err, StoreError::RefAlreadyExists { .. }));
    }

    #[test]
    fn deleted_reference_reads_as_absent_until_purged() {
        let adapter = adapter();
        let created = adapter.create_reference("refs/heads/dev", EMPTY_OBJ_ID).unwrap();
        let deleted = adapter.mark_reference_as_deleted(&created).unwrap();
        assert!(deleted.deleted);

        assert!(matches!(
            adapter.fetch_reference("refs/heads/dev").unwrap_err(),
            StoreError::RefNotFound { .. }
        ));
        // Still occupies the name.
        assert!(matches!(
            adapter.create_reference("refs/heads/dev", EMPTY_OBJ_ID).unwrap_err(),
            StoreError::RefAlreadyExists { .. }
        ));

        adapter.purge_reference(&deleted).unwrap();
        assert!(adapter.create_reference("refs/heads/dev", EMPTY_OBJ_ID).is_ok());
    }

    #[test]
    fn purge_of_live_reference_is_rejected() {
        let adapter = adapter();
        let created = adapter.create_reference("refs/heads/live", EMPTY_OBJ_ID).unwrap();
        let err = adapter.purge_reference(&created).unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));
        // The row is untouched.
        assert!(adapter.fetch_reference("refs/heads/live").is_ok());
    }

    #[test]
    fn purge_requires_matching_state() {
        let adapter = adapter();
        let created = adapter.create_reference("refs/heads/x", EMPTY_OBJ_ID).unwrap();
        // Not deleted yet; purging with a stale expectation conflicts.
        let err = adapter.purge_reference(&created.as_deleted()).unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));
    }

    #[test]
    fn fetch_references_lists_live_rows_only() {
        let adapter = adapter();
        adapter.create_reference("refs/heads/a", EMPTY_OBJ_ID).unwrap();
        let b = adapter.create_reference("refs/heads/b", EMPTY_OBJ_ID).unwrap();
        adapter.mark_reference_as_deleted(&b).unwrap();
        let names: Vec<_> = adapter
            .fetch_references()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["refs/heads/a"]);
    }

    #[test]
    fn commit_advances_the_reference() {
        let adapter = adapter();
        adapter.create_reference("refs/heads/main", EMPTY_OBJ_ID).unwrap();

        let commit = commit_obj(1, "first", EMPTY_OBJ_ID);
        let new_head = commit.id().clone();
        let value = value_obj("cid", b"v1");
        let updated = adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/main".into(),
                expected_head: EMPTY_OBJ_ID,
                objs: vec![commit.clone(), value],
                new_head: new_head.clone(),
            })
            .unwrap();
        assert_eq!(updated.pointer, new_head);
        assert_eq!(adapter.fetch_obj(&new_head).unwrap(), commit);
    }

    #[test]
    fn losing_commit_orphans_objects_and_retry_converges() {
        let adapter = adapter();
        adapter.create_reference("refs/heads/main", EMPTY_OBJ_ID).unwrap();

        // Writer A wins.
        let a = commit_obj(1, "a", EMPTY_OBJ_ID);
        adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/main".into(),
                expected_head: EMPTY_OBJ_ID,
                objs: vec![a.clone()],
                new_head: a.id().clone(),
            })
            .unwrap();

        // Writer B computed against the old head: phase 1 lands, phase 2
        // conflicts.
        let b = commit_obj(1, "b", EMPTY_OBJ_ID);
        let shared_value = value_obj("cid", b"v1");
        let err = adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/main".into(),
                expected_head: EMPTY_OBJ_ID,
                objs: vec![b.clone(), shared_value.clone()],
                new_head: b.id().clone(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));

        // The orphaned objects are present and harmless.
        assert!(adapter.obj_exists(b.id()).unwrap());

        // B recomputes against the new head; the identical value object is
        // re-written as a no-op and nothing is corrupted.
        let b2 = commit_obj(2, "b", a.id().clone());
        let updated = adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/main".into(),
                expected_head: a.id().clone(),
                objs: vec![b2.clone(), shared_value.clone()],
                new_head: b2.id().clone(),
            })
            .unwrap();
        assert_eq!(updated.pointer, *b2.id());
        assert_eq!(adapter.fetch_obj(shared_value.id()).unwrap(), shared_value);
    }

    #[test]
    fn events_fire_after_durable_changes() {
        let (adapter, consumer) = recording_adapter();
        let reference = adapter.create_reference("refs/heads/main", EMPTY_OBJ_ID).unwrap();
        let commit = commit_obj(1, "c", EMPTY_OBJ_ID);
        adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/main".into(),
                expected_head: EMPTY_OBJ_ID,
                objs: vec![commit.clone()],
                new_head: commit.id().clone(),
            })
            .unwrap();
        adapter
            .mark_reference_as_deleted(&reference.advanced(commit.id().clone()))
            .unwrap();

        let events = consumer.events();
        assert_eq!(
            events,
            vec![
                AdapterEvent::ReferenceChanged {
                    name: "refs/heads/main".into(),
                    change: ReferenceChange::Created {
                        pointer: EMPTY_OBJ_ID
                    },
                },
                AdapterEvent::ObjsPersisted {
                    ids: vec![commit.id().clone()],
                },
                AdapterEvent::ReferenceChanged {
                    name: "refs/heads/main".into(),
                    change: ReferenceChange::PointerUpdated {
                        from: EMPTY_OBJ_ID,
                        to: commit.id().clone(),
                    },
                },
                AdapterEvent::ReferenceChanged {
                    name: "refs/heads/main".into(),
                    change: ReferenceChange::Deleted,
                },
            ]
        );
    }

    #[test]
    fn idempotent_rewrite_emits_no_event() {
        let (adapter, consumer) = recording_adapter();
        let obj = value_obj("cid", b"v");
        adapter.store_obj(&obj).unwrap();
        adapter.store_obj(&obj).unwrap();
        assert_eq!(
            consumer.events(),
            vec![AdapterEvent::ObjsPersisted {
                ids: vec![obj.id().clone()],
            }]
        );
    }
}
