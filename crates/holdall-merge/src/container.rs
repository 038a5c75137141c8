use holdall_store::{resolve_bucket_conflict, ConflictResolver, StateValue, StoreResult};
use holdall_types::fields::LAST_MODIFIED;
use holdall_types::Timestamp;
use tracing::{debug, info};

use crate::error::MergeResult;

/// Find the timestamp stored right after the `"Last Modified"` key anywhere
/// in a state tuple.
///
/// Entries that refuse comparison (persistent references) are skipped as
/// non-matches.
pub fn find_last_modified(state: &StateValue) -> Option<Timestamp> {
    let items = state.as_tuple()?;
    for (i, item) in items.iter().enumerate() {
        if is_last_modified_key(item) {
            if let Some(t) = items.get(i + 1).and_then(StateValue::as_float) {
                return Some(t);
            }
        }
        if let found @ Some(_) = find_last_modified(item) {
            return found;
        }
    }
    None
}

/// Overwrite the timestamp stored after the `"Last Modified"` key. Returns
/// `true` if a slot was found.
pub fn set_last_modified(state: &mut StateValue, value: Timestamp) -> bool {
    let StateValue::Tuple(items) = state else {
        return false;
    };
    let mut i = 0;
    while i < items.len() {
        if is_last_modified_key(&items[i]) && i + 1 < items.len() {
            items[i + 1] = StateValue::Float(value);
            return true;
        }
        if set_last_modified(&mut items[i], value) {
            return true;
        }
        i += 1;
    }
    false
}

fn is_last_modified_key(item: &StateValue) -> bool {
    item.try_eq(&StateValue::Str(LAST_MODIFIED.to_string()))
        .unwrap_or(false)
}

/// The newest `"Last Modified"` value across several states.
pub fn max_last_modified<'a>(states: impl IntoIterator<Item = &'a StateValue>) -> Option<Timestamp> {
    states
        .into_iter()
        .filter_map(find_last_modified)
        .reduce(f64::max)
}

/// Merge three versions of an associative container's bucket state.
///
/// The `"Last Modified"` slot is forced to the maximum across the three
/// versions first, so it can never be the source of a conflict. The rest of
/// the bucket goes to the ordered-tree resolver, whose failure is fatal.
pub fn resolve_container_state(
    old: &StateValue,
    committed: &StateValue,
    mine: &StateValue,
) -> MergeResult<StateValue> {
    let mut old = old.clone();
    let mut committed = committed.clone();
    let mut mine = mine.clone();

    if let Some(newest) = max_last_modified([&old, &committed, &mine]) {
        for state in [&mut old, &mut committed, &mut mine] {
            set_last_modified(state, newest);
        }
        debug!(newest, "maxed last-modified slot");
    }

    Ok(resolve_bucket_conflict(&old, &committed, &mine)?)
}

/// The conflict callback persisted containers register with the state
/// store.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastModifiedResolver;

impl ConflictResolver for LastModifiedResolver {
    fn resolve_conflict(
        &self,
        old: &StateValue,
        committed: &StateValue,
        mine: &StateValue,
    ) -> StoreResult<StateValue> {
        info!("resolving container conflict");
        Ok(resolve_container_state(old, committed, mine)?)
    }
}
