use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::deleter::DeferringFileDeleter;
use crate::error::GcResult;
use crate::persistence::LiveSetPersistence;
use crate::stream::ScopedStream;
use crate::types::{ContentReference, FileReference};

/// Phase of a garbage-collection run.
///
/// `IdentifyFailed` and `ExpiryFailed` are terminal; `ExpirySuccess` is the
/// only state from which the run's bookkeeping may be deleted as a matter
/// of routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    IdentifyInProgress,
    IdentifySuccess,
    IdentifyFailed,
    ExpiryInProgress,
    ExpirySuccess,
    ExpiryFailed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::IdentifyInProgress => "identify-in-progress",
            Status::IdentifySuccess => "identify-success",
            Status::IdentifyFailed => "identify-failed",
            Status::ExpiryInProgress => "expiry-in-progress",
            Status::ExpirySuccess => "expiry-success",
            Status::ExpiryFailed => "expiry-failed",
        };
        f.write_str(s)
    }
}

/// Durable snapshot of one run's lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSetRecord {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub identify_completed: Option<DateTime<Utc>>,
    pub expiry_started: Option<DateTime<Utc>>,
    pub expiry_completed: Option<DateTime<Utc>>,
    pub status: Status,
    /// Failure message captured at the transition that failed. Messages are
    /// stored as plain strings so the record outlives the error value.
    pub error_message: Option<String>,
}

impl LiveSetRecord {
    pub(crate) fn started(id: Uuid, created: DateTime<Utc>) -> Self {
        Self {
            id,
            created,
            identify_completed: None,
            expiry_started: None,
            expiry_completed: None,
            status: Status::IdentifyInProgress,
            error_message: None,
        }
    }
}

/// Handle on one garbage-collection run's identified-live bookkeeping.
///
/// Cloning is cheap; all state lives behind the shared persistence. Content
/// references may only be added while identify is in progress, which the
/// persistence enforces.
#[derive(Clone)]
pub struct LiveContentSet {
    persistence: Arc<dyn LiveSetPersistence>,
    record: LiveSetRecord,
}

impl LiveContentSet {
    /// Start a fresh run with a random id, in `IdentifyInProgress`.
    pub fn begin_identify(
        persistence: Arc<dyn LiveSetPersistence>,
        now: DateTime<Utc>,
    ) -> GcResult<Self> {
        let id = Uuid::new_v4();
        let record = persistence.start_identify(id, now)?;
        info!(live_set = %id, "identify phase started");
        Ok(Self {
            persistence,
            record,
        })
    }

    /// Attach to an existing run.
    pub fn attach(persistence: Arc<dyn LiveSetPersistence>, id: Uuid) -> GcResult<Self> {
        let record = persistence.fetch(id)?;
        Ok(Self {
            persistence,
            record,
        })
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn status(&self) -> Status {
        self.record.status
    }

    pub fn record(&self) -> &LiveSetRecord {
        &self.record
    }

    /// Conclude the identify phase. `failure` turns the run into the
    /// terminal `IdentifyFailed` with the message captured on the record.
    pub fn finished_identify(
        &mut self,
        now: DateTime<Utc>,
        failure: Option<&str>,
    ) -> GcResult<()> {
        self.record = self
            .persistence
            .finished_identify(self.record.id, now, failure)?;
        info!(live_set = %self.record.id, status = %self.record.status, "identify phase finished");
        Ok(())
    }

    /// Move the run from `IdentifySuccess` into `ExpiryInProgress`.
    pub fn start_expire_contents(&mut self, now: DateTime<Utc>) -> GcResult<()> {
        self.record = self.persistence.start_expire(self.record.id, now)?;
        info!(live_set = %self.record.id, "expiry phase started");
        Ok(())
    }

    /// Conclude the expire phase, analogous to [`finished_identify`].
    ///
    /// [`finished_identify`]: LiveContentSet::finished_identify
    pub fn finished_expire_contents(
        &mut self,
        now: DateTime<Utc>,
        failure: Option<&str>,
    ) -> GcResult<()> {
        self.record = self
            .persistence
            .finished_expire(self.record.id, now, failure)?;
        info!(live_set = %self.record.id, status = %self.record.status, "expiry phase finished");
        Ok(())
    }

    /// Remove this run and everything recorded under it.
    pub fn delete(self) -> GcResult<()> {
        info!(live_set = %self.record.id, "deleting live content set");
        self.persistence.delete_live_set(self.record.id)
    }

    /// Record one identified-live content reference.
    pub fn add_content_reference(&self, reference: ContentReference) -> GcResult<()> {
        debug!(live_set = %self.record.id, content_id = %reference.content_id, "adding content reference");
        self.persistence
            .add_content_reference(self.record.id, reference)
    }

    pub fn fetch_distinct_content_id_count(&self) -> GcResult<u64> {
        self.persistence.distinct_content_id_count(self.record.id)
    }

    pub fn fetch_content_ids(&self) -> GcResult<ScopedStream<String>> {
        self.persistence.fetch_content_ids(self.record.id)
    }

    pub fn fetch_content_references(
        &self,
        content_id: &str,
    ) -> GcResult<ScopedStream<ContentReference>> {
        self.persistence
            .fetch_content_references(self.record.id, content_id)
    }

    /// Associate base storage locations with a content id.
    ///
    /// A base location shared by several content ids is recorded once per
    /// content id, not globally deduplicated; [`fetch_all_base_locations`]
    /// can therefore yield the same location more than once.
    ///
    /// [`fetch_all_base_locations`]: LiveContentSet::fetch_all_base_locations
    pub fn associate_base_locations(
        &self,
        content_id: &str,
        base_locations: &[String],
    ) -> GcResult<()> {
        self.persistence
            .associate_base_locations(self.record.id, content_id, base_locations)
    }

    pub fn fetch_all_base_locations(&self) -> GcResult<ScopedStream<String>> {
        self.persistence.fetch_all_base_locations(self.record.id)
    }

    pub fn fetch_base_locations(&self, content_id: &str) -> GcResult<ScopedStream<String>> {
        self.persistence
            .fetch_base_locations(self.record.id, content_id)
    }

    /// Record files for deferred deletion; duplicates are ignored. Returns
    /// the number of files newly recorded.
    pub fn add_file_deletions(&self, files: Vec<FileReference>) -> GcResult<u64> {
        self.persistence.add_file_deletions(self.record.id, files)
    }

    /// The recorded deferred deletions, grouped by base location.
    pub fn fetch_file_deletions(&self) -> GcResult<ScopedStream<FileReference>> {
        self.persistence.fetch_file_deletions(self.record.id)
    }

    /// A deleter that defers: every delete is recorded against this run
    /// instead of touching storage.
    pub fn file_deleter(&self) -> DeferringFileDeleter {
        DeferringFileDeleter::new(self.clone())
    }
}

impl fmt::Debug for LiveContentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveContentSet")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}
