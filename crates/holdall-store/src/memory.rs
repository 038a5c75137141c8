use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use holdall_types::Oid;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::persistent::Persistent;
use crate::state::StateValue;
use crate::traits::{ConflictResolver, ObjectDatabase, Serial, StateStore};

enum Record<T: ?Sized> {
    Live(Weak<T>),
    Unreadable,
}

/// In-memory, HashMap-based object database.
///
/// Intended for tests and embedding. The database does not own the objects
/// registered with it: records hold weak handles, and the object's lifetime
/// belongs to whoever holds the strong reference. Dropping the last strong
/// reference turns the record into a dead reference. [`invalidate`] marks a
/// record unreadable instead, simulating data that can no longer be loaded.
///
/// State history is kept per record so that a write based on an older
/// serial can be resolved against the exact state it was read from.
///
/// [`invalidate`]: InMemoryDatabase::invalidate
pub struct InMemoryDatabase<T: ?Sized> {
    next_oid: AtomicU64,
    records: RwLock<HashMap<Oid, Record<T>>>,
    states: RwLock<HashMap<Oid, Vec<(Serial, StateValue)>>>,
}

impl<T: ?Sized> InMemoryDatabase<T> {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self {
            next_oid: AtomicU64::new(1),
            records: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Number of registered object records.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no object has been registered.
    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Mark a record's data as unreadable. Later resolution of the record
    /// fails with [`StoreError::Unreadable`].
    pub fn invalidate(&self, oid: Oid) {
        debug!(%oid, "invalidating record");
        self.records
            .write()
            .expect("lock poisoned")
            .insert(oid, Record::Unreadable);
    }

    /// Number of committed state versions for a record.
    pub fn history_len(&self, oid: Oid) -> usize {
        self.states
            .read()
            .expect("lock poisoned")
            .get(&oid)
            .map_or(0, Vec::len)
    }
}

impl<T: ?Sized> Default for InMemoryDatabase<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Persistent> ObjectDatabase<T> for InMemoryDatabase<T> {
    fn register(&self, obj: &Arc<T>) -> StoreResult<Oid> {
        let oid = obj
            .persistence()
            .bind_with(|| Oid::new(self.next_oid.fetch_add(1, Ordering::SeqCst)));
        let mut records = self.records.write().expect("lock poisoned");
        records
            .entry(oid)
            .or_insert_with(|| Record::Live(Arc::downgrade(obj)));
        Ok(oid)
    }

    fn resolve(&self, oid: Oid) -> StoreResult<Option<Arc<T>>> {
        let records = self.records.read().expect("lock poisoned");
        match records.get(&oid) {
            None => Ok(None),
            Some(Record::Live(handle)) => Ok(handle.upgrade()),
            Some(Record::Unreadable) => Err(StoreError::Unreadable(oid)),
        }
    }
}

impl<T: ?Sized> StateStore for InMemoryDatabase<T>
where
    Self: Send + Sync,
{
    fn new_oid(&self) -> Oid {
        Oid::new(self.next_oid.fetch_add(1, Ordering::SeqCst))
    }

    fn load_state(&self, oid: Oid) -> StoreResult<Option<(Serial, StateValue)>> {
        let states = self.states.read().expect("lock poisoned");
        Ok(states.get(&oid).and_then(|history| history.last().cloned()))
    }

    fn store_state(
        &self,
        oid: Oid,
        read_serial: Serial,
        state: StateValue,
        resolver: Option<&dyn ConflictResolver>,
    ) -> StoreResult<Serial> {
        let mut states = self.states.write().expect("lock poisoned");
        let history = states.entry(oid).or_default();
        let committed_serial = history.last().map_or(0, |(serial, _)| *serial);

        let to_store = if committed_serial == read_serial {
            state
        } else {
            let Some(resolver) = resolver else {
                return Err(StoreError::WriteConflict {
                    oid,
                    read: read_serial,
                    committed: committed_serial,
                });
            };
            let old = history
                .iter()
                .find(|(serial, _)| *serial == read_serial)
                .map_or(StateValue::None, |(_, s)| s.clone());
            let committed = history
                .last()
                .map_or(StateValue::None, |(_, s)| s.clone());
            info!(%oid, read_serial, committed_serial, "resolving write conflict");
            resolver.resolve_conflict(&old, &committed, &state)?
        };

        let serial = committed_serial + 1;
        history.push((serial, to_store));
        Ok(serial)
    }
}
