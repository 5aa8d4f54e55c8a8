use serde::{Deserialize, Serialize};
use verso_types::ObjId;

/// A named, mutable pointer into the commit DAG — a branch or tag head.
///
/// References are the single mutable concept in the store. Every change to
/// one goes through a compare-and-swap keyed on the full current state, so
/// concurrent writers race and exactly one wins; losers re-read and retry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Unique reference name, e.g. `refs/heads/main`.
    pub name: String,
    /// Current head commit.
    pub pointer: ObjId,
    /// Soft-deletion marker; a deleted reference is invisible to readers
    /// until an adapter purges the row.
    pub deleted: bool,
    pub created_at_micros: i64,
    pub extended_info: Option<ObjId>,
}

impl Reference {
    pub fn new(
        name: impl Into<String>,
        pointer: ObjId,
        created_at_micros: i64,
        extended_info: Option<ObjId>,
    ) -> Self {
        Self {
            name: name.into(),
            pointer,
            deleted: false,
            created_at_micros,
            extended_info,
        }
    }

    /// The state this reference takes after a successful pointer CAS.
    pub fn advanced(&self, new_pointer: ObjId) -> Self {
        Self {
            pointer: new_pointer,
            ..self.clone()
        }
    }

    /// The state this reference takes after a successful soft-delete CAS.
    pub fn as_deleted(&self) -> Self {
        Self {
            deleted: true,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use verso_types::{ContentHasher, EMPTY_OBJ_ID};

    use super::*;

    #[test]
    fn advanced_changes_only_the_pointer() {
        let reference = Reference::new("refs/heads/main", EMPTY_OBJ_ID, 42, None);
        let head = ContentHasher::hash(b"commit");
        let advanced = reference.advanced(head.clone());
        assert_eq!(advanced.pointer, head);
        assert_eq!(advanced.name, reference.name);
        assert_eq!(advanced.created_at_micros, 42);
        assert!(!advanced.deleted);
    }

    #[test]
    fn as_deleted_sets_only_the_flag() {
        let reference = Reference::new("refs/tags/v1", EMPTY_OBJ_ID, 7, None);
        let deleted = reference.as_deleted();
        assert!(deleted.deleted);
        assert_eq!(deleted.pointer, reference.pointer);
    }
}
