use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::{Buf, BufMut};

use crate::error::IdError;

/// The well-known id of "nothing": the SHA-256 digest of the literal string
/// `"empty"`. Its hex form is part of the persisted format and must never
/// change.
pub const EMPTY_OBJ_ID: ObjId = ObjId::Sha256([
    0x2e, 0x1c, 0xfa, 0x82, 0xb0, 0x35, 0xc2, 0x6c, 0xbb, 0xbd, 0xae, 0x63, 0x2c, 0xea, 0x07,
    0x05, 0x14, 0xeb, 0x8b, 0x77, 0x3f, 0x61, 0x6a, 0xae, 0xaf, 0x66, 0x8e, 0x2f, 0x0b, 0xe8,
    0xf1, 0x0d,
]);

/// Variable-length, self-describing identifier for any stored object.
///
/// Real content ids are always 32-byte SHA-256 digests minted by
/// [`ContentHasher`](crate::ContentHasher). The other variants exist for
/// backends that need short synthetic identifiers and for the zero-length
/// marker id. Identity is structural over the raw bytes, so an empty
/// `Generic` compares equal to `Empty`.
#[derive(Clone, Debug)]
pub enum ObjId {
    /// The zero-length marker id.
    Empty,
    /// A raw byte sequence, shorter than the digest width. Used for
    /// small/test/backend-assigned identifiers, never for real content.
    Generic(Box<[u8]>),
    /// A full 32-byte content digest.
    Sha256([u8; 32]),
}

impl ObjId {
    /// Wrap raw bytes as an id without hashing.
    ///
    /// An empty slice yields [`ObjId::Empty`], 32 bytes yield
    /// [`ObjId::Sha256`], anything else [`ObjId::Generic`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes.len() {
            0 => Self::Empty,
            32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(bytes);
                Self::Sha256(arr)
            }
            _ => Self::Generic(bytes.to_vec().into_boxed_slice()),
        }
    }

    /// Parse an id from its lowercase (or uppercase) hex string form.
    ///
    /// The empty string denotes the zero-length id. Fails on odd-length
    /// input and on non-hex characters.
    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        match hex::decode(s) {
            Ok(bytes) => Ok(Self::from_bytes(&bytes)),
            Err(hex::FromHexError::OddLength) => Err(IdError::new(format!(
                "hash length needs to be a multiple of two, but was {}",
                s.len()
            ))),
            Err(hex::FromHexError::InvalidHexCharacter { c, index }) => Err(IdError::new(
                format!("illegal hex character '{c}' at index {index}"),
            )),
            Err(e) => Err(IdError::new(e.to_string())),
        }
    }

    /// Byte length of this id.
    pub fn size(&self) -> usize {
        self.as_slice().len()
    }

    /// Wire size: one length-prefix byte plus the raw bytes.
    pub fn serialized_size(&self) -> usize {
        self.size() + 1
    }

    /// The raw bytes of this id.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Generic(b) => b,
            Self::Sha256(b) => b,
        }
    }

    /// The raw bytes as an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Returns `true` for the zero-length id.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Extract the `index`-th 4-bit nibble, high nibble first within each
    /// byte. Valid for `0 <= index < 2 * size()`.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index — that is a caller bug, not a data
    /// condition.
    pub fn nibble_at(&self, index: usize) -> u8 {
        let bytes = self.as_slice();
        assert!(
            index < bytes.len() * 2,
            "nibble index {index} out of range for id of {} bytes",
            bytes.len()
        );
        let byte = bytes[index >> 1];
        if index & 1 == 0 {
            byte >> 4
        } else {
            byte & 0x0f
        }
    }

    /// Write the wire form: one length-prefix byte followed by the raw
    /// bytes. The prefix always carries the exact byte length (`0` for the
    /// zero-length id); ids longer than 255 bytes have no wire form and are
    /// rejected rather than wrapped around. Real content ids are 32 bytes,
    /// so the cap only constrains synthetic generic ids.
    pub fn serialize_into(&self, buf: &mut impl BufMut) -> Result<(), IdError> {
        let bytes = self.as_slice();
        if bytes.len() > 255 {
            return Err(IdError::new(format!(
                "id of {} bytes does not fit a one-byte length prefix",
                bytes.len()
            )));
        }
        buf.put_u8(bytes.len() as u8);
        buf.put_slice(bytes);
        Ok(())
    }

    /// Read an id from its wire form.
    pub fn deserialize_from(buf: &mut impl Buf) -> Result<Self, IdError> {
        if buf.remaining() < 1 {
            return Err(IdError::new("truncated id: missing length prefix"));
        }
        let len = buf.get_u8() as usize;
        if buf.remaining() < len {
            return Err(IdError::new(format!(
                "truncated id: expected {len} bytes, have {}",
                buf.remaining()
            )));
        }
        let mut bytes = vec![0u8; len];
        buf.copy_to_slice(&mut bytes);
        Ok(Self::from_bytes(&bytes))
    }
}

impl PartialEq for ObjId {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ObjId {}

impl Hash for ObjId {
    /// Hashes only the leading four bytes (zero-padded, big-endian). Ids
    /// are digests, so four bytes are plenty of entropy for in-memory sets
    /// and keep hashing cheap when sets get large.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let bytes = self.as_slice();
        let mut lead = [0u8; 4];
        let n = bytes.len().min(4);
        lead[..n].copy_from_slice(&bytes[..n]);
        state.write_u32(u32::from_be_bytes(lead));
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_slice()))
    }
}

impl serde::Serialize for ObjId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ObjId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
