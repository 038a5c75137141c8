use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;

use holdall_types::fields::SYNTHETIC_KEYS;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Transient name/parent pair attached to externalized mappings and lists
/// while decorators run. Never serialized and ignored by equality.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// Name under which the value appears in its parent.
    pub name: String,
    /// External identifier of the object the value belongs to.
    pub parent: Option<String>,
}

impl Location {
    pub fn new(name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            parent,
        }
    }
}

// ---------------------------------------------------------------------------
// ExternalValue
// ---------------------------------------------------------------------------

/// Plain data produced by externalization.
///
/// Values have a total order: `Null < Bool < numbers < String < List < Map
/// < Opaque`, numbers compared numerically regardless of representation.
#[derive(Clone, Debug)]
pub enum ExternalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(ExternalList),
    Map(ExternalMap),
    /// An object no strategy could convert. Kept so callers can detect the
    /// leak; encoders refuse it.
    Opaque(OpaqueValue),
}

/// Marker for an object that externalized to itself.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OpaqueValue {
    pub type_name: String,
}

impl ExternalValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ExternalValue::Null)
    }

    /// Truthiness: null, `false`, zero, and empty strings/collections are
    /// falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ExternalValue::Null => false,
            ExternalValue::Bool(b) => *b,
            ExternalValue::Int(i) => *i != 0,
            ExternalValue::Float(f) => *f != 0.0,
            ExternalValue::String(s) => !s.is_empty(),
            ExternalValue::List(l) => !l.is_empty(),
            ExternalValue::Map(m) => !m.is_empty(),
            ExternalValue::Opaque(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExternalValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExternalValue::Int(i) => Some(*i as f64),
            ExternalValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ExternalMap> {
        match self {
            ExternalValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ExternalMap> {
        match self {
            ExternalValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ExternalList> {
        match self {
            ExternalValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// The first opaque value found anywhere in this value.
    pub fn find_opaque(&self) -> Option<&OpaqueValue> {
        match self {
            ExternalValue::Opaque(o) => Some(o),
            ExternalValue::List(l) => l.iter().find_map(ExternalValue::find_opaque),
            ExternalValue::Map(m) => m.values().find_map(ExternalValue::find_opaque),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ExternalValue::Null => 0,
            ExternalValue::Bool(_) => 1,
            ExternalValue::Int(_) | ExternalValue::Float(_) => 2,
            ExternalValue::String(_) => 3,
            ExternalValue::List(_) => 4,
            ExternalValue::Map(_) => 5,
            ExternalValue::Opaque(_) => 6,
        }
    }
}

impl Ord for ExternalValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use ExternalValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Int(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.items.cmp(&b.items),
            (Map(a), Map(b)) => a.entries.iter().cmp(b.entries.iter()),
            (Opaque(a), Opaque(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for ExternalValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ExternalValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ExternalValue {}

impl Serialize for ExternalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExternalValue::Null => serializer.serialize_unit(),
            ExternalValue::Bool(b) => serializer.serialize_bool(*b),
            ExternalValue::Int(i) => serializer.serialize_i64(*i),
            ExternalValue::Float(f) => serializer.serialize_f64(*f),
            ExternalValue::String(s) => serializer.serialize_str(s),
            ExternalValue::List(l) => l.serialize(serializer),
            ExternalValue::Map(m) => m.serialize(serializer),
            ExternalValue::Opaque(o) => Err(S::Error::custom(format!(
                "cannot encode opaque value of type {}",
                o.type_name
            ))),
        }
    }
}

impl From<serde_json::Value> for ExternalValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ExternalValue::Null,
            serde_json::Value::Bool(b) => ExternalValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ExternalValue::Int(i),
                None => ExternalValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ExternalValue::String(s),
            serde_json::Value::Array(items) => {
                ExternalValue::List(items.into_iter().map(ExternalValue::from).collect())
            }
            serde_json::Value::Object(entries) => ExternalValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, ExternalValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ExternalValue {
    fn from(s: &str) -> Self {
        ExternalValue::String(s.to_string())
    }
}

impl From<String> for ExternalValue {
    fn from(s: String) -> Self {
        ExternalValue::String(s)
    }
}

impl From<bool> for ExternalValue {
    fn from(b: bool) -> Self {
        ExternalValue::Bool(b)
    }
}

impl From<i64> for ExternalValue {
    fn from(i: i64) -> Self {
        ExternalValue::Int(i)
    }
}

impl From<f64> for ExternalValue {
    fn from(f: f64) -> Self {
        ExternalValue::Float(f)
    }
}

impl From<ExternalMap> for ExternalValue {
    fn from(m: ExternalMap) -> Self {
        ExternalValue::Map(m)
    }
}

impl From<ExternalList> for ExternalValue {
    fn from(l: ExternalList) -> Self {
        ExternalValue::List(l)
    }
}

// ---------------------------------------------------------------------------
// ExternalMap
// ---------------------------------------------------------------------------

/// Ordered string-keyed mapping of externalized values.
#[derive(Clone, Debug, Default)]
pub struct ExternalMap {
    entries: BTreeMap<String, ExternalValue>,
    location: Option<Location>,
}

impl ExternalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ExternalValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ExternalValue> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert, replacing any previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ExternalValue>,
    ) -> Option<ExternalValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Insert only when the key is absent. Returns `true` if inserted.
    pub fn insert_if_absent(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ExternalValue>,
    ) -> bool {
        match self.entries.entry(key.into()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ExternalValue> {
        self.entries.remove(key)
    }

    pub fn retain(&mut self, f: impl FnMut(&String, &mut ExternalValue) -> bool) {
        self.entries.retain(f);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ExternalValue> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, ExternalValue> {
        self.entries.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, String, ExternalValue> {
        self.entries.values()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }

    pub fn clear_location(&mut self) {
        self.location = None;
    }
}

impl PartialEq for ExternalMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.iter().eq(other.entries.iter())
    }
}

impl Eq for ExternalMap {}

impl Serialize for ExternalMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, ExternalValue)> for ExternalMap {
    fn from_iter<I: IntoIterator<Item = (K, ExternalValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            location: None,
        }
    }
}

impl<'a> IntoIterator for &'a ExternalMap {
    type Item = (&'a String, &'a ExternalValue);
    type IntoIter = btree_map::Iter<'a, String, ExternalValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// ExternalList
// ---------------------------------------------------------------------------

/// Ordered sequence of externalized values.
#[derive(Clone, Debug, Default)]
pub struct ExternalList {
    items: Vec<ExternalValue>,
    location: Option<Location>,
}

impl ExternalList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, value: impl Into<ExternalValue>) {
        self.items.push(value.into());
    }

    pub fn contains(&self, value: &ExternalValue) -> bool {
        self.items.contains(value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExternalValue> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ExternalValue> {
        self.items.iter_mut()
    }

    pub fn items(&self) -> &[ExternalValue] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ExternalValue> {
        self.items
    }

    pub fn retain(&mut self, f: impl FnMut(&ExternalValue) -> bool) {
        self.items.retain(f);
    }

    pub fn sort(&mut self) {
        self.items.sort();
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = Some(location);
    }
}

impl PartialEq for ExternalList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for ExternalList {}

impl Serialize for ExternalList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl FromIterator<ExternalValue> for ExternalList {
    fn from_iter<I: IntoIterator<Item = ExternalValue>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            location: None,
        }
    }
}

impl From<Vec<ExternalValue>> for ExternalList {
    fn from(items: Vec<ExternalValue>) -> Self {
        Self {
            items,
            location: None,
        }
    }
}

impl IntoIterator for ExternalList {
    type Item = ExternalValue;
    type IntoIter = std::vec::IntoIter<ExternalValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExternalList {
    type Item = &'a ExternalValue;
    type IntoIter = std::slice::Iter<'a, ExternalValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ---------------------------------------------------------------------------
// Post-passes
// ---------------------------------------------------------------------------

/// Remove nulls from every mapping and list, recursively.
///
/// Run before encoders that cannot represent "no value".
pub fn strip_none(value: &mut ExternalValue) {
    match value {
        ExternalValue::Map(m) => {
            m.retain(|_, v| !v.is_null());
            for v in m.entries.values_mut() {
                strip_none(v);
            }
        }
        ExternalValue::List(l) => {
            l.retain(|v| !v.is_null());
            for v in l.iter_mut() {
                strip_none(v);
            }
        }
        _ => {}
    }
}

/// Drop the keys the store and the externalizer own from client-supplied
/// data.
pub fn strip_synthetic_keys(map: &mut ExternalMap) {
    map.retain(|k, _| !SYNTHETIC_KEYS.contains(&k.as_str()));
}
