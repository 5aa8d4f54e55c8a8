use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GcResult;
use crate::live_set::LiveSetRecord;
use crate::stream::ScopedStream;
use crate::types::{ContentReference, FileReference};

/// Durable backing for live-content-set runs.
///
/// Implementations own the state machine's legality: a transition whose
/// required predecessor state is not the current state must fail with
/// `GcError::IllegalState`, and content references may only be added while
/// identify is in progress. Streaming reads hand out [`ScopedStream`]s; the
/// underlying cursor is released when the stream is dropped.
pub trait LiveSetPersistence: Send + Sync {
    /// Create a new run in `IdentifyInProgress`.
    fn start_identify(&self, id: Uuid, created: DateTime<Utc>) -> GcResult<LiveSetRecord>;

    /// Finish the identify phase: success without `failure`, terminal
    /// `IdentifyFailed` with the captured message otherwise.
    fn finished_identify(
        &self,
        id: Uuid,
        finished: DateTime<Utc>,
        failure: Option<&str>,
    ) -> GcResult<LiveSetRecord>;

    /// Move from `IdentifySuccess` to `ExpiryInProgress`.
    fn start_expire(&self, id: Uuid, started: DateTime<Utc>) -> GcResult<LiveSetRecord>;

    /// Finish the expire phase: `ExpirySuccess` or `ExpiryFailed`.
    fn finished_expire(
        &self,
        id: Uuid,
        finished: DateTime<Utc>,
        failure: Option<&str>,
    ) -> GcResult<LiveSetRecord>;

    fn fetch(&self, id: Uuid) -> GcResult<LiveSetRecord>;

    /// Remove the run and everything recorded under it.
    fn delete_live_set(&self, id: Uuid) -> GcResult<()>;

    /// Record one identified-live content reference. Only legal while the
    /// run is in `IdentifyInProgress`.
    fn add_content_reference(&self, id: Uuid, reference: ContentReference) -> GcResult<()>;

    fn distinct_content_id_count(&self, id: Uuid) -> GcResult<u64>;

    fn fetch_content_ids(&self, id: Uuid) -> GcResult<ScopedStream<String>>;

    fn fetch_content_references(
        &self,
        id: Uuid,
        content_id: &str,
    ) -> GcResult<ScopedStream<ContentReference>>;

    /// Associate base storage locations with a content id. Base locations
    /// shared across different content ids are intentionally NOT
    /// deduplicated; callers may observe duplicate accounting.
    fn associate_base_locations(
        &self,
        id: Uuid,
        content_id: &str,
        base_locations: &[String],
    ) -> GcResult<()>;

    fn fetch_all_base_locations(&self, id: Uuid) -> GcResult<ScopedStream<String>>;

    fn fetch_base_locations(&self, id: Uuid, content_id: &str) -> GcResult<ScopedStream<String>>;

    /// Record files for deferred deletion, ignoring duplicates. Returns the
    /// number actually added.
    fn add_file_deletions(&self, id: Uuid, files: Vec<FileReference>) -> GcResult<u64>;

    /// The recorded deferred deletions, grouped by base location.
    fn fetch_file_deletions(&self, id: Uuid) -> GcResult<ScopedStream<FileReference>>;
}
