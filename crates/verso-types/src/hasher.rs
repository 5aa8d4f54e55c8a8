use sha2::{Digest, Sha256};

use crate::id::ObjId;

/// SHA-256 content hashing over canonical bytes.
///
/// This is the sole way real content ids are minted: the id of every stored
/// object is the digest of its canonical serialized form. Identical content
/// always yields the identical id, which is what makes the store
/// content-addressed and deduplicating.
///
/// The digest function is pinned: [`EMPTY_OBJ_ID`](crate::EMPTY_OBJ_ID) is a
/// literal constant in the persisted format, so swapping the hash would be a
/// format break.
pub struct ContentHasher;

impl ContentHasher {
    /// Hash canonical bytes into a 32-byte content id.
    pub fn hash(data: &[u8]) -> ObjId {
        let digest: [u8; 32] = Sha256::digest(data).into();
        ObjId::Sha256(digest)
    }

    /// Verify that `data` hashes to `expected`.
    pub fn verify(data: &[u8], expected: &ObjId) -> bool {
        Self::hash(data) == *expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(ContentHasher::hash(b"abc"), ContentHasher::hash(b"abc"));
    }

    #[test]
    fn different_data_produces_different_ids() {
        assert_ne!(ContentHasher::hash(b"abc"), ContentHasher::hash(b"abd"));
    }

    #[test]
    fn hash_is_always_full_width() {
        assert!(matches!(ContentHasher::hash(b""), ObjId::Sha256(_)));
        assert_eq!(ContentHasher::hash(b"x").size(), 32);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::hash(b"original");
        assert!(ContentHasher::verify(b"original", &id));
        assert!(!ContentHasher::verify(b"tampered", &id));
    }
}
