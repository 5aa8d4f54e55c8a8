use serde::{Deserialize, Serialize};

/// Configuration for a backend adapter.
///
/// Immutable once the adapter is built; every tunable is explicit and typed.
/// The adapter never reads the environment — callers that want environment
/// coupling build the config themselves at the process entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Repository discriminator, prefixed onto every backend key so several
    /// catalogs can share one physical store. Default: `""`.
    pub repo_id: String,
    /// Maximum serialized size of a key-index payload (a commit's embedded
    /// incremental index or a standalone index segment). Oversized indexes
    /// must be split into multiple segment objects. Default: 128 KiB.
    pub max_index_segment_size: usize,
    /// Maximum serialized size of a string-data payload. Default: 256 KiB.
    pub max_string_data_size: usize,
    /// Assumed worst-case wall-clock drift between writers, informational
    /// for timestamp consumers. Default: 5 seconds.
    pub assumed_wall_clock_drift_micros: i64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            repo_id: String::new(),
            max_index_segment_size: 128 * 1024,
            max_string_data_size: 256 * 1024,
            assumed_wall_clock_drift_micros: 5_000_000,
        }
    }
}
