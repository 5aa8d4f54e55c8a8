use serde::{Deserialize, Serialize};

/// Ordered commit/tag headers: key/value pairs, multi-valued per key.
///
/// Order is part of the canonical form, so two header sets with the same
/// pairs in a different order hash to different object ids. `get` returns
/// the first value for a key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHeaders {
    entries: Vec<(String, String)>,
}

impl CommitHeaders {
    /// Empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key/value pair, keeping any existing values for the key.
    pub fn add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_first_value() {
        let headers = CommitHeaders::new()
            .add("author", "alice")
            .add("author", "bob");
        assert_eq!(headers.get("author"), Some("alice"));
        let all: Vec<_> = headers.all("author").collect();
        assert_eq!(all, vec!["alice", "bob"]);
    }

    #[test]
    fn missing_key_is_none() {
        assert_eq!(CommitHeaders::new().get("absent"), None);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let headers = CommitHeaders::new().add("b", "2").add("a", "1");
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1")]);
        assert_eq!(headers.len(), 2);
        assert!(!headers.is_empty());
    }
}
