use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How keys of an associative structure compare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Keys compare exactly.
    #[default]
    Exact,
    /// Keys compare and are stored lower-cased.
    CaseInsensitive,
    /// Keys compare case-insensitively; the first spelling inserted is
    /// the one reported.
    CaseInsensitivePreserving,
}

impl KeyPolicy {
    pub fn fold(&self, key: &str) -> String {
        match self {
            KeyPolicy::Exact => key.to_string(),
            KeyPolicy::CaseInsensitive | KeyPolicy::CaseInsensitivePreserving => {
                key.to_lowercase()
            }
        }
    }
}

/// An ordered string-keyed map that applies a [`KeyPolicy`].
#[derive(Clone, Debug, Default)]
pub struct KeyedMap<V> {
    policy: KeyPolicy,
    entries: BTreeMap<String, (String, V)>,
}

impl<V> KeyedMap<V> {
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            policy,
            entries: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&self.policy.fold(key))
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(&self.policy.fold(key)).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .get_mut(&self.policy.fold(key))
            .map(|(_, v)| v)
    }

    /// The spelling under which `key` is reported.
    pub fn reported_key(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&self.policy.fold(key))
            .map(|(k, _)| k.as_str())
    }

    /// Insert, returning the previous value. A preserving map keeps the
    /// spelling of the existing entry.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        let folded = self.policy.fold(key);
        match self.entries.entry(folded) {
            btree_map::Entry::Occupied(mut slot) => {
                Some(std::mem::replace(&mut slot.get_mut().1, value))
            }
            btree_map::Entry::Vacant(slot) => {
                let reported = reported_spelling(self.policy, key, slot.key());
                slot.insert((reported, value));
                None
            }
        }
    }

    /// The value under `key`, inserting `make()` first if absent.
    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        let folded = self.policy.fold(key);
        let reported = reported_spelling(self.policy, key, &folded);
        &mut self
            .entries
            .entry(folded)
            .or_insert_with(|| (reported, make()))
            .1
    }

    /// Remove an entry, returning its reported key and value.
    pub fn remove(&mut self, key: &str) -> Option<(String, V)> {
        self.entries.remove(&self.policy.fold(key))
    }

    pub fn retain(&mut self, mut f: impl FnMut(&str, &mut V) -> bool) {
        self.entries.retain(|_, (k, v)| f(k, v));
    }

    /// Entries in folded-key order, with their reported keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut V)> {
        self.entries.values_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|(_, v)| v)
    }
}

fn reported_spelling(policy: KeyPolicy, key: &str, folded: &str) -> String {
    match policy {
        KeyPolicy::CaseInsensitive => folded.to_string(),
        KeyPolicy::Exact | KeyPolicy::CaseInsensitivePreserving => key.to_string(),
    }
}
