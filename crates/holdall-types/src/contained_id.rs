use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a contained object within its container.
///
/// Associative containers key their entries by string; sequential containers
/// use the entry's position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContainedId {
    Index(usize),
    Key(String),
}

impl ContainedId {
    /// Returns `true` for the empty string key.
    pub fn is_empty(&self) -> bool {
        matches!(self, ContainedId::Key(k) if k.is_empty())
    }

    /// The string key, if this is a keyed id.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            ContainedId::Key(k) => Some(k),
            ContainedId::Index(_) => None,
        }
    }

    /// The position, if this is a positional id.
    ///
    /// Keys that parse as non-negative integers count as positions too, so
    /// ids that came back through an external representation still resolve.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            ContainedId::Index(i) => Some(*i),
            ContainedId::Key(k) => k.parse().ok(),
        }
    }
}

impl fmt::Display for ContainedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainedId::Index(i) => write!(f, "{i}"),
            ContainedId::Key(k) => f.write_str(k),
        }
    }
}

impl From<&str> for ContainedId {
    fn from(s: &str) -> Self {
        ContainedId::Key(s.to_string())
    }
}

impl From<String> for ContainedId {
    fn from(s: String) -> Self {
        ContainedId::Key(s)
    }
}

impl From<usize> for ContainedId {
    fn from(i: usize) -> Self {
        ContainedId::Index(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_detected() {
        assert!(ContainedId::from("").is_empty());
        assert!(!ContainedId::from("a").is_empty());
        assert!(!ContainedId::Index(0).is_empty());
    }

    #[test]
    fn numeric_key_is_an_index() {
        assert_eq!(ContainedId::from("3").as_index(), Some(3));
        assert_eq!(ContainedId::from("x").as_index(), None);
    }

    #[test]
    fn serde_is_untagged() {
        assert_eq!(serde_json::to_string(&ContainedId::Index(2)).unwrap(), "2");
        assert_eq!(
            serde_json::to_string(&ContainedId::from("k")).unwrap(),
            "\"k\""
        );
        let back: ContainedId = serde_json::from_str("5").unwrap();
        assert_eq!(back, ContainedId::Index(5));
    }
}
