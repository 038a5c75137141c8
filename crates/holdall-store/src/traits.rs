use std::sync::Arc;

use holdall_types::Oid;

use crate::error::StoreResult;
use crate::state::StateValue;

/// Version of a record's stored state. Serial `0` means "never loaded";
/// the first stored state of a record receives serial `1`.
pub type Serial = u64;

/// Registration and resolution of live objects.
///
/// Implementations must satisfy these invariants:
/// - `register` is idempotent: registering an already-registered object
///   returns its existing identity.
/// - `resolve` of a reference whose object no longer exists returns
///   `Ok(None)`.
/// - `resolve` of a reference whose data cannot be read returns
///   `Err(StoreError::Unreadable)`, distinguishable from a dead reference.
///
/// [`StoreError::Unreadable`]: crate::error::StoreError::Unreadable
pub trait ObjectDatabase<T: ?Sized>: Send + Sync {
    /// Mark a newly-referenced object for persistence and return its
    /// identity.
    fn register(&self, obj: &Arc<T>) -> StoreResult<Oid>;

    /// Dereference a stored reference.
    fn resolve(&self, oid: Oid) -> StoreResult<Option<Arc<T>>>;
}

/// Three-way merge callback for persisted state.
///
/// Invoked only when a write was based on a serial older than the one
/// already committed.
pub trait ConflictResolver: Send + Sync {
    fn resolve_conflict(
        &self,
        old: &StateValue,
        committed: &StateValue,
        mine: &StateValue,
    ) -> StoreResult<StateValue>;
}

/// Versioned persisted state with optimistic concurrency.
pub trait StateStore: Send + Sync {
    /// Allocate a fresh record identity.
    fn new_oid(&self) -> Oid;

    /// Latest committed state of a record and its serial, or `None` if
    /// nothing has been stored yet.
    fn load_state(&self, oid: Oid) -> StoreResult<Option<(Serial, StateValue)>>;

    /// Store `state` for a record, based on `read_serial`.
    ///
    /// If another writer committed since `read_serial`, the state that
    /// `read_serial` named, the committed state and `state` are handed to
    /// `resolver`; without a resolver the write fails with
    /// `StoreError::WriteConflict`. Returns the new serial.
    fn store_state(
        &self,
        oid: Oid,
        read_serial: Serial,
        state: StateValue,
        resolver: Option<&dyn ConflictResolver>,
    ) -> StoreResult<Serial>;
}

/// A full database: object registry plus state store.
pub trait Database<T: ?Sized>: ObjectDatabase<T> + StateStore {}

impl<T: ?Sized, D: ObjectDatabase<T> + StateStore + ?Sized> Database<T> for D {}
