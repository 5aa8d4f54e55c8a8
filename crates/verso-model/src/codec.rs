//! Canonical binary encoding of [`Obj`] variants and [`Reference`] records.
//!
//! Wire form of an object: one type-tag byte, then the variant's fields in a
//! fixed order. Strings and byte payloads are u32-length-prefixed
//! (big-endian), lists carry a u32 element count, optional ids a one-byte
//! presence marker. Embedded ids use their own one-byte length-prefixed form
//! ([`ObjId::serialize_into`]), which caps an id at 255 bytes. The object id
//! is *not* part of the bytes — it is the storage key, supplied back on
//! deserialization.
//!
//! There is exactly one encoding for every value (no incidental variation),
//! which is load-bearing: object identity is the hash of these bytes.

use bytes::{Buf, BufMut};
use verso_types::ObjId;

use crate::error::{ModelError, ModelResult};
use crate::headers::CommitHeaders;
use crate::obj::{
    CommitObj, Compression, ContentValueObj, IndexObj, IndexSegmentsObj, Obj, RefObj,
    StringDataObj, TagObj,
};
use crate::reference::Reference;

const TAG_REF: u8 = 1;
const TAG_COMMIT: u8 = 2;
const TAG_TAG: u8 = 3;
const TAG_CONTENT_VALUE: u8 = 4;
const TAG_STRING_DATA: u8 = 5;
const TAG_INDEX_SEGMENTS: u8 = 6;
const TAG_INDEX: u8 = 7;

/// Serialize an object to its canonical bytes.
///
/// `max_index_segment_size` caps serialized key-index payloads (a commit's
/// embedded incremental index and standalone index segments);
/// `max_string_data_size` caps string-data payloads. An object over its cap
/// fails with [`ModelError::SizeExceeded`] so the caller can split it —
/// a truncated object is never produced.
pub fn serialize_obj(
    obj: &Obj,
    max_index_segment_size: usize,
    max_string_data_size: usize,
) -> ModelResult<Vec<u8>> {
    let mut buf = Vec::new();
    match obj {
        Obj::Ref(o) => {
            buf.put_u8(TAG_REF);
            put_str(&mut buf, &o.name);
            put_id(&mut buf, &o.head)?;
            buf.put_i64(o.created_at_micros);
            put_bool(&mut buf, o.deleted);
            put_opt_id(&mut buf, o.extended_info.as_ref())?;
        }
        Obj::Commit(o) => {
            check_size("commit index", o.incremental_index.len(), max_index_segment_size)?;
            buf.put_u8(TAG_COMMIT);
            buf.put_u64(o.seq);
            buf.put_i64(o.created_at_micros);
            put_str(&mut buf, &o.message);
            put_headers(&mut buf, &o.headers);
            put_id_list(&mut buf, &o.parents)?;
            put_bytes(&mut buf, &o.incremental_index);
        }
        Obj::Tag(o) => {
            buf.put_u8(TAG_TAG);
            put_str(&mut buf, &o.message);
            put_headers(&mut buf, &o.headers);
            put_bytes(&mut buf, &o.signature);
        }
        Obj::ContentValue(o) => {
            buf.put_u8(TAG_CONTENT_VALUE);
            put_str(&mut buf, &o.content_id);
            buf.put_i32(o.payload);
            put_bytes(&mut buf, &o.data);
        }
        Obj::StringData(o) => {
            check_size("string data", o.text.len(), max_string_data_size)?;
            buf.put_u8(TAG_STRING_DATA);
            put_str(&mut buf, &o.content_type);
            buf.put_u8(compression_byte(o.compression));
            put_opt_str(&mut buf, o.filename.as_deref());
            put_id_list(&mut buf, &o.predecessors)?;
            put_bytes(&mut buf, &o.text);
        }
        Obj::IndexSegments(o) => {
            buf.put_u8(TAG_INDEX_SEGMENTS);
            put_id_list(&mut buf, &o.segments)?;
        }
        Obj::Index(o) => {
            check_size("index segment", o.index.len(), max_index_segment_size)?;
            buf.put_u8(TAG_INDEX);
            put_bytes(&mut buf, &o.index);
        }
    }
    Ok(buf)
}

/// Deserialize an object from its canonical bytes, re-embedding
/// `expected_id` (the storage key) as the object's identity.
pub fn deserialize_obj(expected_id: &ObjId, bytes: &[u8]) -> ModelResult<Obj> {
    let mut buf = bytes;
    let tag = get_u8(&mut buf)?;
    let mut obj = match tag {
        TAG_REF => Obj::Ref(RefObj {
            id: ObjId::Empty,
            name: get_str(&mut buf)?,
            head: get_id(&mut buf)?,
            created_at_micros: get_i64(&mut buf)?,
            deleted: get_bool(&mut buf)?,
            extended_info: get_opt_id(&mut buf)?,
        }),
        TAG_COMMIT => Obj::Commit(CommitObj {
            id: ObjId::Empty,
            seq: get_u64(&mut buf)?,
            created_at_micros: get_i64(&mut buf)?,
            message: get_str(&mut buf)?,
            headers: get_headers(&mut buf)?,
            parents: get_id_list(&mut buf)?,
            incremental_index: get_bytes(&mut buf)?,
        }),
        TAG_TAG => Obj::Tag(TagObj {
            id: ObjId::Empty,
            message: get_str(&mut buf)?,
            headers: get_headers(&mut buf)?,
            signature: get_bytes(&mut buf)?,
        }),
        TAG_CONTENT_VALUE => Obj::ContentValue(ContentValueObj {
            id: ObjId::Empty,
            content_id: get_str(&mut buf)?,
            payload: get_i32(&mut buf)?,
            data: get_bytes(&mut buf)?,
        }),
        TAG_STRING_DATA => Obj::StringData(StringDataObj {
            id: ObjId::Empty,
            content_type: get_str(&mut buf)?,
            compression: compression_from_byte(get_u8(&mut buf)?)?,
            filename: get_opt_str(&mut buf)?,
            predecessors: get_id_list(&mut buf)?,
            text: get_bytes(&mut buf)?,
        }),
        TAG_INDEX_SEGMENTS => Obj::IndexSegments(IndexSegmentsObj {
            id: ObjId::Empty,
            segments: get_id_list(&mut buf)?,
        }),
        TAG_INDEX => Obj::Index(IndexObj {
            id: ObjId::Empty,
            index: get_bytes(&mut buf)?,
        }),
        other => return Err(ModelError::UnknownTypeTag(other)),
    };
    expect_consumed(buf)?;
    obj.set_id(expected_id.clone());
    Ok(obj)
}

/// Serialize a reference record: name, pointer, deleted flag, creation
/// timestamp, optional extended-info id.
pub fn serialize_reference(reference: &Reference) -> ModelResult<Vec<u8>> {
    let mut buf = Vec::new();
    put_str(&mut buf, &reference.name);
    put_id(&mut buf, &reference.pointer)?;
    put_bool(&mut buf, reference.deleted);
    buf.put_i64(reference.created_at_micros);
    put_opt_id(&mut buf, reference.extended_info.as_ref())?;
    Ok(buf)
}

/// Deserialize a reference record.
pub fn deserialize_reference(bytes: &[u8]) -> ModelResult<Reference> {
    let mut buf = bytes;
    let reference = Reference {
        name: get_str(&mut buf)?,
        pointer: get_id(&mut buf)?,
        deleted: get_bool(&mut buf)?,
        created_at_micros: get_i64(&mut buf)?,
        extended_info: get_opt_id(&mut buf)?,
    };
    expect_consumed(buf)?;
    Ok(reference)
}

// ---------------------------------------------------------------------------
// Field encoders
// ---------------------------------------------------------------------------

fn check_size(kind: &'static str, actual: usize, limit: usize) -> ModelResult<()> {
    if actual > limit {
        return Err(ModelError::SizeExceeded {
            kind,
            limit,
            actual,
        });
    }
    Ok(())
}

fn compression_byte(compression: Compression) -> u8 {
    match compression {
        Compression::None => 0,
        Compression::Gzip => 1,
        Compression::Deflate => 2,
        Compression::Zstd => 3,
    }
}

fn compression_from_byte(byte: u8) -> ModelResult<Compression> {
    match byte {
        0 => Ok(Compression::None),
        1 => Ok(Compression::Gzip),
        2 => Ok(Compression::Deflate),
        3 => Ok(Compression::Zstd),
        other => Err(ModelError::Malformed(format!(
            "unknown compression marker {other}"
        ))),
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn put_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        None => buf.put_u8(0),
        Some(s) => {
            buf.put_u8(1);
            put_str(buf, s);
        }
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn put_bool(buf: &mut Vec<u8>, value: bool) {
    buf.put_u8(u8::from(value));
}

fn put_id(buf: &mut Vec<u8>, id: &ObjId) -> ModelResult<()> {
    id.serialize_into(buf)?;
    Ok(())
}

fn put_opt_id(buf: &mut Vec<u8>, id: Option<&ObjId>) -> ModelResult<()> {
    match id {
        None => buf.put_u8(0),
        Some(id) => {
            buf.put_u8(1);
            put_id(buf, id)?;
        }
    }
    Ok(())
}

fn put_id_list(buf: &mut Vec<u8>, ids: &[ObjId]) -> ModelResult<()> {
    buf.put_u32(ids.len() as u32);
    for id in ids {
        put_id(buf, id)?;
    }
    Ok(())
}

fn put_headers(buf: &mut Vec<u8>, headers: &CommitHeaders) {
    buf.put_u32(headers.len() as u32);
    for (name, value) in headers.iter() {
        put_str(buf, name);
        put_str(buf, value);
    }
}

// ---------------------------------------------------------------------------
// Field decoders (all bounds-checked; the bytes may come from anywhere)
// ---------------------------------------------------------------------------

fn need(buf: &&[u8], n: usize) -> ModelResult<()> {
    if buf.remaining() < n {
        return Err(ModelError::Malformed(format!(
            "truncated: need {n} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

fn get_u8(buf: &mut &[u8]) -> ModelResult<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_i32(buf: &mut &[u8]) -> ModelResult<i32> {
    need(buf, 4)?;
    Ok(buf.get_i32())
}

fn get_u64(buf: &mut &[u8]) -> ModelResult<u64> {
    need(buf, 8)?;
    Ok(buf.get_u64())
}

fn get_i64(buf: &mut &[u8]) -> ModelResult<i64> {
    need(buf, 8)?;
    Ok(buf.get_i64())
}

fn get_bool(buf: &mut &[u8]) -> ModelResult<bool> {
    match get_u8(buf)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ModelError::Malformed(format!(
            "invalid boolean marker {other}"
        ))),
    }
}

fn get_bytes(buf: &mut &[u8]) -> ModelResult<Vec<u8>> {
    need(buf, 4)?;
    let len = buf.get_u32() as usize;
    need(buf, len)?;
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

fn get_str(buf: &mut &[u8]) -> ModelResult<String> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes).map_err(|e| ModelError::Malformed(format!("invalid utf-8: {e}")))
}

fn get_opt_str(buf: &mut &[u8]) -> ModelResult<Option<String>> {
    match get_bool(buf)? {
        false => Ok(None),
        true => Ok(Some(get_str(buf)?)),
    }
}

fn get_id(buf: &mut &[u8]) -> ModelResult<ObjId> {
    Ok(ObjId::deserialize_from(buf)?)
}

fn get_opt_id(buf: &mut &[u8]) -> ModelResult<Option<ObjId>> {
    match get_bool(buf)? {
        false => Ok(None),
        true => Ok(Some(get_id(buf)?)),
    }
}

fn get_id_list(buf: &mut &[u8]) -> ModelResult<Vec<ObjId>> {
    need(buf, 4)?;
    let count = buf.get_u32() as usize;
    let mut ids = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        ids.push(get_id(buf)?);
    }
    Ok(ids)
}

fn get_headers(buf: &mut &[u8]) -> ModelResult<CommitHeaders> {
    need(buf, 4)?;
    let count = buf.get_u32() as usize;
    let mut headers = CommitHeaders::new();
    for _ in 0..count {
        let name = get_str(buf)?;
        let value = get_str(buf)?;
        headers = headers.add(name, value);
    }
    Ok(headers)
}

fn expect_consumed(buf: &[u8]) -> ModelResult<()> {
    if !buf.is_empty() {
        return Err(ModelError::Malformed(format!(
            "{} trailing bytes after object",
            buf.len()
        )));
    }
    Ok(())
}
