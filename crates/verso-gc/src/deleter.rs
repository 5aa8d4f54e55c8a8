use tracing::debug;

use crate::error::GcResult;
use crate::live_set::LiveContentSet;
use crate::types::{DeleteResult, DeleteSummary, FileReference};

/// Sink for files the expire phase decided to remove.
///
/// Implementations may delete immediately or record intent for later; the
/// contract only requires an honest outcome per file.
pub trait FileDeleter: Send + Sync {
    fn delete(&self, file: FileReference) -> GcResult<DeleteResult>;

    fn delete_multiple(
        &self,
        base_location: &str,
        files: Vec<FileReference>,
    ) -> GcResult<DeleteSummary>;
}

/// A [`FileDeleter`] that never touches storage: every delete is recorded
/// on the owning run's deferred-deletion list instead. Duplicate deletes of
/// the same file still count as successes.
pub struct DeferringFileDeleter {
    live_set: LiveContentSet,
}

impl DeferringFileDeleter {
    pub(crate) fn new(live_set: LiveContentSet) -> Self {
        Self { live_set }
    }
}

impl FileDeleter for DeferringFileDeleter {
    fn delete(&self, file: FileReference) -> GcResult<DeleteResult> {
        debug!(live_set = %self.live_set.id(), base = %file.base_location, path = %file.path, "deferring file deletion");
        self.live_set.add_file_deletions(vec![file])?;
        Ok(DeleteResult::Success)
    }

    fn delete_multiple(
        &self,
        base_location: &str,
        files: Vec<FileReference>,
    ) -> GcResult<DeleteSummary> {
        debug!(live_set = %self.live_set.id(), base = %base_location, count = files.len(), "deferring batched file deletion");
        let count = files.len() as u64;
        self.live_set.add_file_deletions(files)?;
        Ok(DeleteSummary {
            deleted: count,
            failed: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::memory::InMemoryLiveSetPersistence;

    fn live_set() -> LiveContentSet {
        let persistence = Arc::new(InMemoryLiveSetPersistence::default());
        let now = Utc.timestamp_opt(1, 0).single().unwrap();
        LiveContentSet::begin_identify(persistence, now).unwrap()
    }

    #[test]
    fn single_delete_is_recorded_not_executed() {
        let set = live_set();
        let deleter = set.file_deleter();

        let file = FileReference::new("s3://a", "data/0001.parquet", 42);
        assert_eq!(deleter.delete(file.clone()).unwrap(), DeleteResult::Success);

        let recorded: Vec<FileReference> = set.fetch_file_deletions().unwrap().collect();
        assert_eq!(recorded, vec![file]);
    }

    #[test]
    fn batched_delete_reports_all_as_deleted() {
        let set = live_set();
        let deleter = set.file_deleter();

        let files = vec![
            FileReference::new("s3://a", "p/1", 1),
            FileReference::new("s3://a", "p/2", 2),
        ];
        let summary = deleter.delete_multiple("s3://a", files).unwrap();
        assert_eq!(summary, DeleteSummary { deleted: 2, failed: 0 });
        assert_eq!(set.fetch_file_deletions().unwrap().count(), 2);
    }

    #[test]
    fn repeated_delete_of_same_file_still_succeeds() {
        let set = live_set();
        let deleter = set.file_deleter();
        let file = FileReference::new("s3://a", "p/1", 1);

        assert_eq!(deleter.delete(file.clone()).unwrap(), DeleteResult::Success);
        assert_eq!(deleter.delete(file).unwrap(), DeleteResult::Success);
        assert_eq!(set.fetch_file_deletions().unwrap().count(), 1);
    }
}
