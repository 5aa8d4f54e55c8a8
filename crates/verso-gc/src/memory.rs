use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::{GcError, GcResult};
use crate::live_set::{LiveSetRecord, Status};
use crate::persistence::LiveSetPersistence;
use crate::stream::ScopedStream;
use crate::types::{ContentReference, FileReference};

#[derive(Debug)]
struct SetState {
    record: LiveSetRecord,
    /// Content references keyed by content id; BTreeMap keeps content-id
    /// iteration order deterministic.
    content_refs: BTreeMap<String, Vec<ContentReference>>,
    /// Base locations per content id. Deliberately a plain Vec per id: the
    /// same location under several content ids stays recorded per id.
    base_locations: BTreeMap<String, Vec<String>>,
    /// Sorted by base location first, so iteration is already grouped.
    file_deletions: BTreeSet<FileReference>,
}

impl SetState {
    fn new(record: LiveSetRecord) -> Self {
        Self {
            record,
            content_refs: BTreeMap::new(),
            base_locations: BTreeMap::new(),
            file_deletions: BTreeSet::new(),
        }
    }
}

/// Heap-backed [`LiveSetPersistence`] used in tests and single-process
/// tooling. Enforces the full phase state machine and counts open cursors
/// so stream-release behavior is observable.
#[derive(Default)]
pub struct InMemoryLiveSetPersistence {
    inner: Mutex<HashMap<Uuid, SetState>>,
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryLiveSetPersistence {
    /// Number of streams handed out and not yet dropped.
    pub fn open_cursor_count(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn with_state<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut SetState) -> GcResult<T>,
    ) -> GcResult<T> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let state = inner.get_mut(&id).ok_or(GcError::NotFound(id))?;
        f(state)
    }

    fn stream_of<T: Send + 'static>(&self, items: Vec<T>) -> ScopedStream<T> {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        let cursors = self.open_cursors.clone();
        ScopedStream::new(items.into_iter(), move || {
            cursors.fetch_sub(1, Ordering::SeqCst);
        })
    }

    fn require_status(state: &SetState, expected: Status, action: &str) -> GcResult<()> {
        if state.record.status != expected {
            return Err(GcError::IllegalState(format!(
                "cannot {action} while in status {}, requires {expected}",
                state.record.status
            )));
        }
        Ok(())
    }
}

impl LiveSetPersistence for InMemoryLiveSetPersistence {
    fn start_identify(&self, id: Uuid, created: DateTime<Utc>) -> GcResult<LiveSetRecord> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.contains_key(&id) {
            return Err(GcError::IllegalState(format!(
                "live content set {id} already exists"
            )));
        }
        let record = LiveSetRecord::started(id, created);
        inner.insert(id, SetState::new(record.clone()));
        Ok(record)
    }

    fn finished_identify(
        &self,
        id: Uuid,
        finished: DateTime<Utc>,
        failure: Option<&str>,
    ) -> GcResult<LiveSetRecord> {
        self.with_state(id, |state| {
            Self::require_status(state, Status::IdentifyInProgress, "finish identify")?;
            state.record.identify_completed = Some(finished);
            state.record.status = match failure {
                None => Status::IdentifySuccess,
                Some(msg) => {
                    state.record.error_message = Some(msg.to_string());
                    Status::IdentifyFailed
                }
            };
            Ok(state.record.clone())
        })
    }

    fn start_expire(&self, id: Uuid, started: DateTime<Utc>) -> GcResult<LiveSetRecord> {
        self.with_state(id, |state| {
            Self::require_status(state, Status::IdentifySuccess, "start expiry")?;
            state.record.expiry_started = Some(started);
            state.record.status = Status::ExpiryInProgress;
            Ok(state.record.clone())
        })
    }

    fn finished_expire(
        &self,
        id: Uuid,
        finished: DateTime<Utc>,
        failure: Option<&str>,
    ) -> GcResult<LiveSetRecord> {
        self.with_state(id, |state| {
            Self::require_status(state, Status::ExpiryInProgress, "finish expiry")?;
            state.record.expiry_completed = Some(finished);
            state.record.status = match failure {
                None => Status::ExpirySuccess,
                Some(msg) => {
                    state.record.error_message = Some(msg.to_string());
                    Status::ExpiryFailed
                }
            };
            Ok(state.record.clone())
        })
    }

    fn fetch(&self, id: Uuid) -> GcResult<LiveSetRecord> {
        let inner = self.inner.lock().expect("lock poisoned");
        inner
            .get(&id)
            .map(|state| state.record.clone())
            .ok_or(GcError::NotFound(id))
    }

    fn delete_live_set(&self, id: Uuid) -> GcResult<()> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.remove(&id).ok_or(GcError::NotFound(id))?;
        debug!(live_set = %id, "removed live content set");
        Ok(())
    }

    fn add_content_reference(&self, id: Uuid, reference: ContentReference) -> GcResult<()> {
        self.with_state(id, |state| {
            Self::require_status(state, Status::IdentifyInProgress, "add content reference")?;
            state
                .content_refs
                .entry(reference.content_id.clone())
                .or_default()
                .push(reference);
            Ok(())
        })
    }

    fn distinct_content_id_count(&self, id: Uuid) -> GcResult<u64> {
        self.with_state(id, |state| Ok(state.content_refs.len() as u64))
    }

    fn fetch_content_ids(&self, id: Uuid) -> GcResult<ScopedStream<String>> {
        let ids =
            self.with_state(id, |state| Ok(state.content_refs.keys().cloned().collect()))?;
        Ok(self.stream_of(ids))
    }

    fn fetch_content_references(
        &self,
        id: Uuid,
        content_id: &str,
    ) -> GcResult<ScopedStream<ContentReference>> {
        let refs = self.with_state(id, |state| {
            Ok(state
                .content_refs
                .get(content_id)
                .cloned()
                .unwrap_or_default())
        })?;
        Ok(self.stream_of(refs))
    }

    fn associate_base_locations(
        &self,
        id: Uuid,
        content_id: &str,
        base_locations: &[String],
    ) -> GcResult<()> {
        self.with_state(id, |state| {
            state
                .base_locations
                .entry(content_id.to_string())
                .or_default()
                .extend(base_locations.iter().cloned());
            Ok(())
        })
    }

    fn fetch_all_base_locations(&self, id: Uuid) -> GcResult<ScopedStream<String>> {
        let locations = self.with_state(id, |state| {
            Ok(state
                .base_locations
                .values()
                .flatten()
                .cloned()
                .collect::<Vec<_>>())
        })?;
        Ok(self.stream_of(locations))
    }

    fn fetch_base_locations(&self, id: Uuid, content_id: &str) -> GcResult<ScopedStream<String>> {
        let locations = self.with_state(id, |state| {
            Ok(state
                .base_locations
                .get(content_id)
                .cloned()
                .unwrap_or_default())
        })?;
        Ok(self.stream_of(locations))
    }

    fn add_file_deletions(&self, id: Uuid, files: Vec<FileReference>) -> GcResult<u64> {
        self.with_state(id, |state| {
            let mut added = 0u64;
            for file in files {
                if state.file_deletions.insert(file) {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    fn fetch_file_deletions(&self, id: Uuid) -> GcResult<ScopedStream<FileReference>> {
        let files = self.with_state(id, |state| {
            Ok(state.file_deletions.iter().cloned().collect::<Vec<_>>())
        })?;
        Ok(self.stream_of(files))
    }
}
