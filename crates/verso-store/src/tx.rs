//! The transactional family: stores with native multi-key transactions.
//!
//! [`TransactionalAdapter`] wraps each logical operation in one backend
//! transaction. Unlike the non-transactional family, a failed reference CAS
//! here rolls the whole operation back — no orphaned objects. A backend
//! conflict on commit is mapped to the same
//! [`CasConflict`](crate::StoreError::CasConflict) outcome callers already
//! handle.

use std::sync::Arc;

use tracing::debug;
use verso_model::{deserialize_obj, deserialize_reference, serialize_reference, Obj, Reference};
use verso_types::ObjId;

use crate::config::AdapterConfig;
use crate::error::{StoreError, StoreResult};
use crate::events::{AdapterEvent, AdapterEventConsumer, ReferenceChange};
use crate::keys::{encode_obj, now_micros, obj_key, ref_key, ref_prefix};
use crate::traits::{BackendAdapter, CommitAttempt};

/// Outcome of committing a backend transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    /// The backend detected a serialization conflict with a concurrent
    /// transaction. Nothing was written.
    Conflict,
}

/// One open backend transaction. Dropping a handle without calling
/// [`commit`](TxHandle::commit) rolls it back; staged writes are only
/// visible to this handle until commit.
pub trait TxHandle {
    fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn put(&mut self, key: &str, value: Vec<u8>);

    fn delete(&mut self, key: &str);

    fn scan_prefix(&mut self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    fn commit(self: Box<Self>) -> StoreResult<TxOutcome>;
}

/// Contract a transactional physical store must satisfy.
pub trait TxBackend: Send + Sync {
    fn begin(&self) -> StoreResult<Box<dyn TxHandle + '_>>;
}

/// Adapter over a [`TxBackend`].
pub struct TransactionalAdapter<B> {
    config: AdapterConfig,
    backend: B,
    events: Arc<dyn AdapterEventConsumer>,
}

impl<B: TxBackend> TransactionalAdapter<B> {
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

    /// Stage one object write inside `tx`. Returns `true` if the object is
    /// new to the store.
    fn stage_obj(&self, tx: &mut dyn TxHandle, obj: &Obj) -> StoreResult<bool> {
        let bytes = encode_obj(&self.config, obj)?;
        let key = obj_key(&self.config.repo_id, obj.id());
        match tx.get(&key)? {
            Some(existing) if existing == bytes => Ok(false),
            Some(_) => Err(StoreError::ObjMismatch {
                id: obj.id().clone(),
            }),
            None => {
                tx.put(&key, bytes);
                Ok(true)
            }
        }
    }

    /// Stage a reference row swap after validating the stored row equals
    /// `expected`.
    fn stage_reference_swap(
        &self,
        tx: &mut dyn TxHandle,
        expected: &Reference,
        next: Option<&Reference>,
    ) -> StoreResult<()> {
        let key = ref_key(&self.config.repo_id, &expected.name);
        let stored = tx.get(&key)?;
        if stored.as_deref() != Some(serialize_reference(expected)?.as_slice()) {
            return Err(StoreError::CasConflict {
                name: expected.name.clone(),
            });
        }
        match next {
            Some(next) => tx.put(&key, serialize_reference(next)?),
            None => tx.delete(&key),
        }
        Ok(())
    }

    fn commit_tx(&self, tx: Box<dyn TxHandle + '_>, name: &str) -> StoreResult<()> {
        match tx.commit()? {
            TxOutcome::Committed => Ok(()),
            TxOutcome::Conflict => {
                debug!(name, "backend transaction conflict mapped to CAS failure");
                Err(StoreError::CasConflict {
                    name: name.to_string(),
                })
            }
        }
    }
}

impl<B: TxBackend> BackendAdapter for TransactionalAdapter<B> {
    fn store_obj(&self, obj: &Obj) -> StoreResult<bool> {
        Ok(self.store_objs(std::slice::from_ref(obj))?[0])
    }

    fn store_objs(&self, objs: &[Obj]) -> StoreResult<Vec<bool>> {
        // Object writes are content-addressed and idempotent, so a
        // transaction conflict with a rival writer is resolved by
        // re-staging against the new committed state: rows the rival
        // already wrote become no-ops (or ObjMismatch on a real collision)
        // and the write set shrinks every round until the commit lands.
        loop {
            let mut tx = self.backend.begin()?;
            let mut results = Vec::with_capacity(objs.len());
            let mut persisted = Vec::new();
            for obj in objs {
                let stored = self.stage_obj(tx.as_mut(), obj)?;
                if stored {
                    persisted.push(obj.id().clone());
                }
                results.push(stored);
            }
            match tx.commit()? {
                TxOutcome::Committed => {
                    if !persisted.is_empty() {
                        self.events
                            .accept(AdapterEvent::ObjsPersisted { ids: persisted });
                    }
                    return Ok(results);
                }
                TxOutcome::Conflict => {
                    debug!(count = objs.len(), "object write conflict, re-staging");
                }
            }
        }
    }

    fn fetch_obj(&self, id: &ObjId) -> StoreResult<Obj> {
        let mut tx = self.backend.begin()?;
        let bytes = tx
            .get(&obj_key(&self.config.repo_id, id))?
            .ok_or_else(|| StoreError::ObjNotFound { id: id.clone() })?;
        Ok(deserialize_obj(id, &bytes)?)
    }

    fn obj_exists(&self, id: &ObjId) -> StoreResult<bool> {
        let mut tx = self.backend.begin()?;
        Ok(tx.get(&obj_key(&self.config.repo_id, id))?.is_some())
    }

    fn create_reference(&self, name: &str, pointer: ObjId) -> StoreResult<Reference> {
        let reference = Reference::new(name, pointer.clone(), now_micros(), None);
        let key = ref_key(&self.config.repo_id, name);
        let mut tx = self.backend.begin()?;
        if tx.get(&key)?.is_some() {
            return Err(StoreError::RefAlreadyExists {
                name: name.to_string(),
            });
        }
        tx.put(&key, serialize_reference(&reference)?);
        match tx.commit()? {
            TxOutcome::Committed => {}
            // The only competing write on this key is a concurrent create.
            TxOutcome::Conflict => {
                return Err(StoreError::RefAlreadyExists {
                    name: name.to_string(),
                })
            }
        }
        self.events.accept(AdapterEvent::ReferenceChanged {
            name: name.to_string(),
            change: ReferenceChange::Created { pointer },
        });
        Ok(reference)
    }

    fn fetch_reference(&self, name: &str) -> StoreResult<Reference> {
        let mut tx = self.backend.begin()?;
        match tx.get(&ref_key(&self.config.repo_id, name))? {
            Some(bytes) => {
                let reference = deserialize_reference(&bytes)?;
                if reference.deleted {
                    Err(StoreError::RefNotFound {
                        name: name.to_string(),
                    })
                } else {
                    Ok(reference)
                }
            }
            None => Err(StoreError::RefNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn fetch_references(&self) -> StoreResult<Vec<Reference>> {
        let mut tx = self.backend.begin()?;
        let mut references = Vec::new();
        for (_, bytes) in tx.scan_prefix(&ref_prefix(&self.config.repo_id))? {
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
        let mut tx = self.backend.begin()?;
        self.stage_reference_swap(tx.as_mut(), expected, Some(&next))?;
        self.commit_tx(tx, &expected.name)?;
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
        let mut tx = self.backend.begin()?;
        self.stage_reference_swap(tx.as_mut(), expected, Some(&next))?;
        self.commit_tx(tx, &expected.name)?;
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
        let mut tx = self.backend.begin()?;
        self.stage_reference_swap(tx.as_mut(), expected, None)?;
        self.commit_tx(tx, &expected.name)?;
        self.events.accept(AdapterEvent::ReferenceChanged {
            name: expected.name.clone(),
            change: ReferenceChange::Purged,
        });
        Ok(())
    }

    fn commit(&self, attempt: CommitAttempt) -> StoreResult<Reference> {
        let mut tx = self.backend.begin()?;

        let mut persisted = Vec::new();
        for obj in &attempt.objs {
            if self.stage_obj(tx.as_mut(), obj)? {
                persisted.push(obj.id().clone());
            }
        }

        let key = ref_key(&self.config.repo_id, &attempt.reference_name);
        let current = match tx.get(&key)? {
            Some(bytes) => deserialize_reference(&bytes)?,
            None => {
                return Err(StoreError::RefNotFound {
                    name: attempt.reference_name,
                })
            }
        };
        if current.deleted {
            return Err(StoreError::RefNotFound {
                name: attempt.reference_name,
            });
        }
        if current.pointer != attempt.expected_head {
            // Rolls back the staged object writes too.
            return Err(StoreError::CasConflict {
                name: attempt.reference_name,
            });
        }
        let next = current.advanced(attempt.new_head.clone());
        tx.put(&key, serialize_reference(&next)?);
        self.commit_tx(tx, &attempt.reference_name)?;

        if !persisted.is_empty() {
            self.events
                .accept(AdapterEvent::ObjsPersisted { ids: persisted });
        }
        self.events.accept(AdapterEvent::ReferenceChanged {
            name: attempt.reference_name,
            change: ReferenceChange::PointerUpdated {
                from: attempt.expected_head,
                to: attempt.new_head,
            },
        });
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use verso_model::{CommitHeaders, CommitObj, ContentValueObj};
    use verso_types::{ContentHasher, EMPTY_OBJ_ID};

    use super::*;
    use crate::events::test_support::RecordingConsumer;
    use crate::events::NoopEventConsumer;
    use crate::memory::InMemoryTxBackend;

    /// Backend that injects one rival write right before the first commit,
    /// forcing a serialization conflict on that transaction.
    struct RacingBackend {
        inner: InMemoryTxBackend,
        rival: Mutex<Option<(String, Vec<u8>)>>,
    }

    impl RacingBackend {
        fn new(rival_key: String, rival_bytes: Vec<u8>) -> Self {
            Self {
                inner: InMemoryTxBackend::new(),
                rival: Mutex::new(Some((rival_key, rival_bytes))),
            }
        }
    }

    impl TxBackend for RacingBackend {
        fn begin(&self) -> StoreResult<Box<dyn TxHandle + '_>> {
            Ok(Box::new(RacingTx {
                backend: self,
                tx: Some(self.inner.begin()?),
            }))
        }
    }

    struct RacingTx<'a> {
        backend: &'a RacingBackend,
        tx: Option<Box<dyn TxHandle + 'a>>,
    }

    impl RacingTx<'_> {
        fn inner(&mut self) -> &mut dyn TxHandle {
            self.tx.as_mut().expect("transaction consumed").as_mut()
        }
    }

    impl TxHandle for RacingTx<'_> {
        fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.inner().get(key)
        }

        fn put(&mut self, key: &str, value: Vec<u8>) {
            self.inner().put(key, value)
        }

        fn delete(&mut self, key: &str) {
            self.inner().delete(key)
        }

        fn scan_prefix(&mut self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
            self.inner().scan_prefix(prefix)
        }

        fn commit(mut self: Box<Self>) -> StoreResult<TxOutcome> {
            let pending = self.backend.rival.lock().expect("lock poisoned").take();
            if let Some((key, bytes)) = pending {
                let mut rival = self.backend.inner.begin()?;
                rival.put(&key, bytes);
                rival.commit()?;
            }
            self.tx.take().expect("transaction consumed").commit()
        }
    }

    fn adapter() -> TransactionalAdapter<InMemoryTxBackend> {
        TransactionalAdapter::new(
            AdapterConfig::default(),
            InMemoryTxBackend::new(),
            Arc::new(NoopEventConsumer),
        )
    }

    fn commit_obj(seq: u64, message: &str, parent: ObjId) -> Obj {
        Obj::Commit(
            CommitObj::build(seq, 42, message, CommitHeaders::new(), vec![parent], vec![])
                .unwrap(),
        )
    }

    #[test]
    fn store_and_fetch_roundtrip() {
        let adapter = adapter();
        let obj = Obj::ContentValue(ContentValueObj::build("cid", 0, b"v".to_vec()).unwrap());
        assert!(adapter.store_obj(&obj).unwrap());
        assert!(!adapter.store_obj(&obj).unwrap());
        assert_eq!(adapter.fetch_obj(obj.id()).unwrap(), obj);
    }

    #[test]
    fn cas_sequence_succeeds_conflicts_then_succeeds() {
        let adapter = adapter();
        let h2 = ContentHasher::hash(b"c2");
        let h3 = ContentHasher::hash(b"c3");

        let at_h1 = adapter.create_reference("refs/heads/main", EMPTY_OBJ_ID).unwrap();
        adapter.update_reference_pointer(&at_h1, h2.clone()).unwrap();

        let err = adapter.update_reference_pointer(&at_h1, h3.clone()).unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));

        let fresh = adapter.fetch_reference("refs/heads/main").unwrap();
        let at_h3 = adapter.update_reference_pointer(&fresh, h3.clone()).unwrap();
        assert_eq!(at_h3.pointer, h3);
    }

    #[test]
    fn store_objs_converges_after_partial_rival_write() {
        let a = Obj::ContentValue(ContentValueObj::build("cid-a", 0, b"a".to_vec()).unwrap());
        let b = Obj::ContentValue(ContentValueObj::build("cid-b", 0, b"b".to_vec()).unwrap());

        // The rival commits only `a`, so the conflicting batch partially
        // overlaps the rival's write set.
        let config = AdapterConfig::default();
        let rival_key = obj_key(&config.repo_id, a.id());
        let rival_bytes = encode_obj(&config, &a).unwrap();
        let consumer = Arc::new(RecordingConsumer::default());
        let adapter = TransactionalAdapter::new(
            config,
            RacingBackend::new(rival_key, rival_bytes),
            consumer.clone(),
        );

        let results = adapter.store_objs(&[a.clone(), b.clone()]).unwrap();
        // `a` converged on the rival's identical row; `b` is ours.
        assert_eq!(results, vec![false, true]);
        assert_eq!(adapter.fetch_obj(a.id()).unwrap(), a);
        assert_eq!(adapter.fetch_obj(b.id()).unwrap(), b);
        assert_eq!(
            consumer.events(),
            vec![AdapterEvent::ObjsPersisted {
                ids: vec![b.id().clone()],
            }]
        );
    }

    #[test]
    fn purge_of_live_reference_is_rejected() {
        let adapter = adapter();
        let created = adapter.create_reference("refs/heads/live", EMPTY_OBJ_ID).unwrap();
        let err = adapter.purge_reference(&created).unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));
        assert!(adapter.fetch_reference("refs/heads/live").is_ok());
    }

    #[test]
    fn failed_commit_rolls_back_object_writes() {
        let adapter = adapter();
        adapter.create_reference("refs/heads/main", EMPTY_OBJ_ID).unwrap();

        let winner = commit_obj(1, "winner", EMPTY_OBJ_ID);
        adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/main".into(),
                expected_head: EMPTY_OBJ_ID,
                objs: vec![winner.clone()],
                new_head: winner.id().clone(),
            })
            .unwrap();

        let loser = commit_obj(1, "loser", EMPTY_OBJ_ID);
        let err = adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/main".into(),
                expected_head: EMPTY_OBJ_ID,
                objs: vec![loser.clone()],
                new_head: loser.id().clone(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));

        // The native transaction rolled everything back: no orphans in this
        // family.
        assert!(!adapter.obj_exists(loser.id()).unwrap());
    }

    #[test]
    fn commit_against_missing_reference_is_not_found() {
        let adapter = adapter();
        let c = commit_obj(1, "c", EMPTY_OBJ_ID);
        let err = adapter
            .commit(CommitAttempt {
                reference_name: "refs/heads/none".into(),
                expected_head: EMPTY_OBJ_ID,
                objs: vec![c.clone()],
                new_head: c.id().clone(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::RefNotFound { .. }));
    }

    #[test]
    fn deleted_reference_lifecycle() {
        let adapter = adapter();
        let created = adapter.create_reference("refs/tags/v1", EMPTY_OBJ_ID).unwrap();
        let deleted = adapter.mark_reference_as_deleted(&created).unwrap();
        assert!(matches!(
            adapter.fetch_reference("refs/tags/v1").unwrap_err(),
            StoreError::RefNotFound { .. }
        ));
        adapter.purge_reference(&deleted).unwrap();
        assert!(adapter.create_reference("refs/tags/v1", EMPTY_OBJ_ID).is_ok());
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
}
