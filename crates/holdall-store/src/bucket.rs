//! Ordered-tree bucket encoding and its three-way merge.
//!
//! A small associative container persists as a single inline bucket:
//! `((k1, v1, k2, v2, ...),)`, keys in ascending order. This is the
//! engine's own resolver for that encoding. It knows nothing about what the
//! keys mean; callers that need special treatment for particular keys
//! rewrite the three versions before calling it.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::state::StateValue;

type Pairs = Vec<(StateValue, StateValue)>;

/// Encode sorted key/value pairs as an inline bucket.
pub fn encode_bucket(pairs: impl IntoIterator<Item = (StateValue, StateValue)>) -> StateValue {
    let flat = pairs.into_iter().flat_map(|(k, v)| [k, v]).collect();
    StateValue::Tuple(vec![StateValue::Tuple(flat)])
}

/// Decode an inline bucket into key/value pairs.
///
/// `StateValue::None` decodes as the empty bucket (a record with no stored
/// state yet).
pub fn decode_bucket(state: &StateValue) -> StoreResult<Pairs> {
    let flat = match state {
        StateValue::None => return Ok(Vec::new()),
        StateValue::Tuple(outer) => match outer.as_slice() {
            [StateValue::Tuple(flat)] => flat,
            _ => return Err(unresolvable("state is not a single inline bucket")),
        },
        _ => return Err(unresolvable("state is not a bucket")),
    };
    if flat.len() % 2 != 0 {
        return Err(unresolvable("bucket has an odd number of slots"));
    }
    Ok(flat
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

/// Three-way key-level merge of inline bucket states.
///
/// Per key: identical on both sides is kept; a change on one side only is
/// applied (inserts, updates and deletes alike). A key changed differently
/// by both sides cannot be merged, and neither can two different inserts
/// under the same new key.
pub fn resolve_bucket_conflict(
    old: &StateValue,
    committed: &StateValue,
    mine: &StateValue,
) -> StoreResult<StateValue> {
    let old = decode_bucket(old)?;
    let committed = decode_bucket(committed)?;
    let mine = decode_bucket(mine)?;

    let mut keys: Vec<StateValue> = Vec::new();
    for (k, _) in old.iter().chain(&committed).chain(&mine) {
        if !keys.contains(k) {
            keys.push(k.clone());
        }
    }

    let mut merged: Pairs = Vec::with_capacity(keys.len());
    for key in keys {
        let o = lookup(&old, &key);
        let c = lookup(&committed, &key);
        let m = lookup(&mine, &key);
        let winner = if c == m {
            c
        } else if c == o {
            m
        } else if m == o {
            c
        } else {
            debug!(?key, "conflicting bucket changes");
            let reason = if o.is_none() {
                format!("conflicting inserts under key {key:?}")
            } else {
                format!("conflicting changes to key {key:?}")
            };
            return Err(StoreError::UnresolvableConflict { reason });
        };
        if let Some(value) = winner {
            merged.push((key, value.clone()));
        }
    }

    sort_pairs(&mut merged)?;
    Ok(encode_bucket(merged))
}

fn lookup<'a>(pairs: &'a Pairs, key: &StateValue) -> Option<&'a StateValue> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn sort_pairs(pairs: &mut Pairs) -> StoreResult<()> {
    let mut failure = None;
    pairs.sort_by(|(a, _), (b, _)| {
        a.cmp_key(b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn unresolvable(reason: &str) -> StoreError {
    StoreError::UnresolvableConflict {
        reason: reason.to_string(),
    }
}
