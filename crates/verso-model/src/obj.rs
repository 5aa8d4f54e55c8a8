use serde::{Deserialize, Serialize};
use verso_types::{ContentHasher, ObjId};

use crate::codec;
use crate::error::ModelResult;
use crate::headers::CommitHeaders;

/// The closed set of typed, immutable object variants.
///
/// Every variant carries its own [`ObjId`]. For hash-identified objects the
/// id is the content hash of the canonical serialized bytes (the id itself
/// is not part of those bytes — it is the storage key). Backends may mint
/// generic/empty ids for synthetic sentinel objects via the `with_id`
/// constructors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Obj {
    Ref(RefObj),
    Commit(CommitObj),
    Tag(TagObj),
    ContentValue(ContentValueObj),
    StringData(StringDataObj),
    IndexSegments(IndexSegmentsObj),
    Index(IndexObj),
}

impl Obj {
    /// The identity of this object.
    pub fn id(&self) -> &ObjId {
        match self {
            Obj::Ref(o) => &o.id,
            Obj::Commit(o) => &o.id,
            Obj::Tag(o) => &o.id,
            Obj::ContentValue(o) => &o.id,
            Obj::StringData(o) => &o.id,
            Obj::IndexSegments(o) => &o.id,
            Obj::Index(o) => &o.id,
        }
    }

    /// Replace the identity (used by the codec when re-embedding the
    /// storage key into a deserialized object).
    pub(crate) fn set_id(&mut self, id: ObjId) {
        match self {
            Obj::Ref(o) => o.id = id,
            Obj::Commit(o) => o.id = id,
            Obj::Tag(o) => o.id = id,
            Obj::ContentValue(o) => o.id = id,
            Obj::StringData(o) => o.id = id,
            Obj::IndexSegments(o) => o.id = id,
            Obj::Index(o) => o.id = id,
        }
    }

    /// Compute the content hash of this object's canonical bytes and embed
    /// it as the object's id.
    fn sealed(mut self) -> ModelResult<Self> {
        let bytes = codec::serialize_obj(&self, usize::MAX, usize::MAX)?;
        self.set_id(ContentHasher::hash(&bytes));
        Ok(self)
    }
}

/// Compression applied to a [`StringDataObj`] payload. One wire byte each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    None,
    Gzip,
    Deflate,
    Zstd,
}

/// A point-in-time snapshot of a named reference, kept as an object so
/// reference history survives reference deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefObj {
    pub id: ObjId,
    /// Reference name, e.g. `refs/heads/main`.
    pub name: String,
    /// The commit the reference pointed to.
    pub head: ObjId,
    pub created_at_micros: i64,
    pub deleted: bool,
    pub extended_info: Option<ObjId>,
}

impl RefObj {
    /// Build a hash-identified ref object.
    pub fn build(
        name: impl Into<String>,
        head: ObjId,
        created_at_micros: i64,
        deleted: bool,
        extended_info: Option<ObjId>,
    ) -> ModelResult<Self> {
        let obj = Obj::Ref(Self {
            id: ObjId::Empty,
            name: name.into(),
            head,
            created_at_micros,
            deleted,
            extended_info,
        })
        .sealed()?;
        match obj {
            Obj::Ref(o) => Ok(o),
            _ => unreachable!(),
        }
    }
}

/// A commit in the version DAG.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitObj {
    pub id: ObjId,
    /// Monotonically increasing per reference lineage; orders commits
    /// without trusting wall clocks.
    pub seq: u64,
    /// Informational only, never used for ordering.
    pub created_at_micros: i64,
    pub message: String,
    pub headers: CommitHeaders,
    /// Direct parent(s); first entry is the primary parent.
    pub parents: Vec<ObjId>,
    /// Serialized incremental key-index payload (opaque to the model).
    pub incremental_index: Vec<u8>,
}

impl CommitObj {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        seq: u64,
        created_at_micros: i64,
        message: impl Into<String>,
        headers: CommitHeaders,
        parents: Vec<ObjId>,
        incremental_index: Vec<u8>,
    ) -> ModelResult<Self> {
        let obj = Obj::Commit(Self {
            id: ObjId::Empty,
            seq,
            created_at_micros,
            message: message.into(),
            headers,
            parents,
            incremental_index,
        })
        .sealed()?;
        match obj {
            Obj::Commit(o) => Ok(o),
            _ => unreachable!(),
        }
    }
}

/// An annotated tag payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagObj {
    pub id: ObjId,
    pub message: String,
    pub headers: CommitHeaders,
    /// Opaque signature/metadata payload.
    pub signature: Vec<u8>,
}

impl TagObj {
    pub fn build(
        message: impl Into<String>,
        headers: CommitHeaders,
        signature: Vec<u8>,
    ) -> ModelResult<Self> {
        let obj = Obj::Tag(Self {
            id: ObjId::Empty,
            message: message.into(),
            headers,
            signature,
        })
        .sealed()?;
        match obj {
            Obj::Tag(o) => Ok(o),
            _ => unreachable!(),
        }
    }
}

/// A versioned content value (table/view metadata payload).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentValueObj {
    pub id: ObjId,
    /// Stable logical content id, shared across versions of one entity.
    pub content_id: String,
    /// Payload format version.
    pub payload: i32,
    pub data: Vec<u8>,
}

impl ContentValueObj {
    pub fn build(content_id: impl Into<String>, payload: i32, data: Vec<u8>) -> ModelResult<Self> {
        let obj = Obj::ContentValue(Self {
            id: ObjId::Empty,
            content_id: content_id.into(),
            payload,
            data,
        })
        .sealed()?;
        match obj {
            Obj::ContentValue(o) => Ok(o),
            _ => unreachable!(),
        }
    }
}

/// A string/blob object with provenance (predecessor) links.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringDataObj {
    pub id: ObjId,
    pub content_type: String,
    pub compression: Compression,
    pub filename: Option<String>,
    /// Ids of earlier versions this value was derived from.
    pub predecessors: Vec<ObjId>,
    pub text: Vec<u8>,
}

impl StringDataObj {
    pub fn build(
        content_type: impl Into<String>,
        compression: Compression,
        filename: Option<String>,
        predecessors: Vec<ObjId>,
        text: Vec<u8>,
    ) -> ModelResult<Self> {
        let obj = Obj::StringData(Self {
            id: ObjId::Empty,
            content_type: content_type.into(),
            compression,
            filename,
            predecessors,
            text,
        })
        .sealed()?;
        match obj {
            Obj::StringData(o) => Ok(o),
            _ => unreachable!(),
        }
    }
}

/// A split key-index: references to the child segment objects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSegmentsObj {
    pub id: ObjId,
    pub segments: Vec<ObjId>,
}

impl IndexSegmentsObj {
    pub fn build(segments: Vec<ObjId>) -> ModelResult<Self> {
        let obj = Obj::IndexSegments(Self {
            id: ObjId::Empty,
            segments,
        })
        .sealed()?;
        match obj {
            Obj::IndexSegments(o) => Ok(o),
            _ => unreachable!(),
        }
    }
}

/// A single serialized key-index segment (opaque payload).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexObj {
    pub id: ObjId,
    pub index: Vec<u8>,
}

impl IndexObj {
    pub fn build(index: Vec<u8>) -> ModelResult<Self> {
        let obj = Obj::Index(Self {
            id: ObjId::Empty,
            index,
        })
        .sealed()?;
        match obj {
            Obj::Index(o) => Ok(o),
            _ => unreachable!(),
        }
    }
}
