use serde::{Deserialize, Serialize};
use verso_types::ObjId;

/// One reachable use of a content id found during the identify phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    /// Stable logical content id.
    pub content_id: String,
    /// The commit in which this use was observed.
    pub commit_id: ObjId,
    /// Catalog key under which the content was reachable.
    pub key: String,
}

/// A file pending (deferred) physical deletion.
///
/// `path` is relative to `base_location`; ordering sorts by base first so a
/// sorted set naturally groups deletions per base location.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileReference {
    pub base_location: String,
    pub path: String,
    pub modification_time_micros: i64,
}

impl FileReference {
    pub fn new(
        base_location: impl Into<String>,
        path: impl Into<String>,
        modification_time_micros: i64,
    ) -> Self {
        Self {
            base_location: base_location.into(),
            path: path.into(),
            modification_time_micros,
        }
    }
}

/// Outcome of one file deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteResult {
    Success,
    Failure,
}

/// Aggregated outcome of a batched deletion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_references_sort_by_base_location_first() {
        let mut files = vec![
            FileReference::new("s3://b", "1", 0),
            FileReference::new("s3://a", "2", 0),
            FileReference::new("s3://a", "1", 0),
        ];
        files.sort();
        assert_eq!(
            files,
            vec![
                FileReference::new("s3://a", "1", 0),
                FileReference::new("s3://a", "2", 0),
                FileReference::new("s3://b", "1", 0),
            ]
        );
    }
}
