//! Backend key layout and small shared helpers.
//!
//! Objects live under `{repo}/o/{hex id}`, references under
//! `{repo}/r/{name}`. The repo prefix lets several catalogs share one
//! physical store without key collisions.

use std::time::{SystemTime, UNIX_EPOCH};

use verso_model::{serialize_obj, Obj};
use verso_types::ObjId;

use crate::config::AdapterConfig;
use crate::error::StoreResult;

pub(crate) fn obj_key(repo_id: &str, id: &ObjId) -> String {
    format!("{repo_id}/o/{id}")
}

pub(crate) fn ref_key(repo_id: &str, name: &str) -> String {
    format!("{repo_id}/r/{name}")
}

pub(crate) fn ref_prefix(repo_id: &str) -> String {
    format!("{repo_id}/r/")
}

/// Serialize an object with the adapter's configured size caps.
pub(crate) fn encode_obj(config: &AdapterConfig, obj: &Obj) -> StoreResult<Vec<u8>> {
    Ok(serialize_obj(
        obj,
        config.max_index_segment_size,
        config.max_string_data_size,
    )?)
}

/// Current wall-clock time in microseconds since the epoch. Informational
/// only — nothing orders on it.
pub(crate) fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as i64)
}
