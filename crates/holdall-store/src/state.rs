use std::cmp::Ordering;

use holdall_types::Oid;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Persisted state of a record, as the storage engine sees it.
///
/// The engine stores plain scalars, tuples of values, and references to
/// other records. References are opaque tokens: the engine can tell whether
/// two references point at the same record, but a reference has no value
/// that could be compared with a string or a number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ref(Oid),
    Tuple(Vec<StateValue>),
}

impl StateValue {
    /// Equality as performed while probing persisted state.
    ///
    /// Comparing a reference with anything other than a reference raises
    /// [`StoreError::IncomparableReference`], the same way the engine's
    /// lazy-loading reference tokens refuse comparison with plain values.
    pub fn try_eq(&self, other: &StateValue) -> StoreResult<bool> {
        match (self, other) {
            (StateValue::Ref(a), StateValue::Ref(b)) => Ok(a == b),
            (StateValue::Ref(oid), _) | (_, StateValue::Ref(oid)) => {
                Err(StoreError::IncomparableReference(*oid))
            }
            (a, b) => Ok(a == b),
        }
    }

    /// Ordering of bucket keys. Only strings and integers are orderable,
    /// and only among themselves.
    pub fn cmp_key(&self, other: &StateValue) -> StoreResult<Ordering> {
        match (self, other) {
            (StateValue::Str(a), StateValue::Str(b)) => Ok(a.cmp(b)),
            (StateValue::Int(a), StateValue::Int(b)) => Ok(a.cmp(b)),
            (StateValue::Str(_) | StateValue::Int(_), bad) | (bad, _) => {
                Err(StoreError::UnorderableKey(format!("{bad:?}")))
            }
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            StateValue::Float(f) => Some(*f),
            StateValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[StateValue]> {
        match self {
            StateValue::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Str(s.to_string())
    }
}

impl From<f64> for StateValue {
    fn from(f: f64) -> Self {
        StateValue::Float(f)
    }
}

impl From<Oid> for StateValue {
    fn from(oid: Oid) -> Self {
        StateValue::Ref(oid)
    }
}
