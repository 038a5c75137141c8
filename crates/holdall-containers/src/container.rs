use std::fmt;
use std::sync::Arc;

use holdall_externalize::Capability;
use holdall_merge::LastModifiedResolver;
use holdall_store::bucket::{decode_bucket, encode_bucket};
use holdall_store::{Database, PersistenceCell, Serial, StateValue, StoreError, StoreResult};
use holdall_types::fields::LAST_MODIFIED;
use holdall_types::{ContainedId, ModTime, Oid, Timestamp};
use tracing::debug;

use crate::config::ContainerKind;
use crate::contained::{same_object, Contained};
use crate::keys::{KeyPolicy, KeyedMap};

/// The database handle containers resolve their entries through.
pub type ContainedDatabase = dyn Database<dyn Contained>;

/// Whether a container owns its entries or only references them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    Owns,
    References,
}

/// Restricts a container to items providing one capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeConstraint {
    pub container_name: String,
    pub contained_type: Capability,
}

/// A stored entry.
#[derive(Clone)]
pub enum Slot {
    /// The object itself.
    Strong(Arc<dyn Contained>),
    /// A reference to an object whose lifetime is owned elsewhere.
    Weak(Oid),
}

impl Slot {
    /// Dereference the entry. A dead weak reference resolves to `None`.
    pub fn resolve(&self, db: &ContainedDatabase) -> StoreResult<Option<Arc<dyn Contained>>> {
        match self {
            Slot::Strong(obj) => Ok(Some(Arc::clone(obj))),
            Slot::Weak(oid) => db.resolve(*oid),
        }
    }

    pub fn oid(&self) -> Option<Oid> {
        match self {
            Slot::Strong(obj) => obj.oid(),
            Slot::Weak(oid) => Some(*oid),
        }
    }

    /// Whether the backing object is broken or unreadable.
    pub fn is_broken(&self, db: &ContainedDatabase) -> bool {
        match self.resolve(db) {
            Err(_) => true,
            Ok(Some(obj)) => obj.is_broken(),
            Ok(None) => false,
        }
    }

    /// Whether a new entry may take this slot's key.
    fn is_vacant(&self, db: &ContainedDatabase) -> bool {
        match self.resolve(db) {
            Err(_) | Ok(None) => true,
            Ok(Some(obj)) => obj.is_broken(),
        }
    }

    fn state(&self) -> StateValue {
        match self {
            Slot::Strong(obj) => obj.oid().map_or(StateValue::None, StateValue::Ref),
            Slot::Weak(oid) => StateValue::Tuple(vec![StateValue::Ref(*oid)]),
        }
    }

    fn from_state(state: &StateValue, db: &ContainedDatabase) -> Option<Slot> {
        match state {
            StateValue::Ref(oid) => Some(match db.resolve(*oid) {
                Ok(Some(obj)) => Slot::Strong(obj),
                _ => Slot::Weak(*oid),
            }),
            StateValue::Tuple(inner) => match inner.as_slice() {
                [StateValue::Ref(oid)] => Some(Slot::Weak(*oid)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Strong(obj) => write!(f, "Strong({})", obj.describe()),
            Slot::Weak(oid) => write!(f, "Weak({oid:?})"),
        }
    }
}

/// Storage shape of a container.
#[derive(Clone, Debug)]
pub enum Slots {
    Associative(KeyedMap<Slot>),
    /// Positional; removal leaves a hole so later ids stay valid.
    Sequential(Vec<Option<Slot>>),
}

/// Outcome of removing an entry by equality.
pub enum Removal {
    Removed(Arc<dyn Contained>),
    NotFound,
    /// An entry ahead of the match could not be compared.
    TypeMismatch,
}

impl fmt::Debug for Removal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Removal::Removed(obj) => write!(f, "Removed({})", obj.describe()),
            Removal::NotFound => f.write_str("NotFound"),
            Removal::TypeMismatch => f.write_str("TypeMismatch"),
        }
    }
}

/// A named sub-collection of contained objects.
#[derive(Debug)]
pub struct Container {
    slots: Slots,
    ownership: Ownership,
    modified: ModTime,
    constraint: Option<TypeConstraint>,
    persistence: PersistenceCell,
    serial: Serial,
}

impl Container {
    pub fn new(kind: ContainerKind, ownership: Ownership) -> Self {
        let slots = match kind {
            ContainerKind::Associative => Slots::Associative(KeyedMap::new(KeyPolicy::Exact)),
            ContainerKind::Sequential => Slots::Sequential(Vec::new()),
        };
        Self {
            slots,
            ownership,
            modified: ModTime::zero(),
            constraint: None,
            persistence: PersistenceCell::new(),
            serial: 0,
        }
    }

    pub fn associative() -> Self {
        Self::new(ContainerKind::Associative, Ownership::Owns)
    }

    pub fn sequential() -> Self {
        Self::new(ContainerKind::Sequential, Ownership::Owns)
    }

    /// An associative container whose keys follow `policy`.
    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        if let Slots::Associative(map) = &self.slots {
            if map.is_empty() {
                self.slots = Slots::Associative(KeyedMap::new(policy));
            }
        }
        self
    }

    pub fn with_constraint(mut self, constraint: TypeConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn kind(&self) -> ContainerKind {
        match self.slots {
            Slots::Associative(_) => ContainerKind::Associative,
            Slots::Sequential(_) => ContainerKind::Sequential,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn constraint(&self) -> Option<&TypeConstraint> {
        self.constraint.as_ref()
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn last_modified(&self) -> Timestamp {
        self.modified.value()
    }

    pub(crate) fn touch(&mut self, t: Option<Timestamp>) -> Timestamp {
        self.modified.update(t);
        self.modified.value()
    }

    pub fn oid(&self) -> Option<Oid> {
        self.persistence.oid()
    }

    /// Number of occupied entries.
    pub fn len(&self) -> usize {
        match &self.slots {
            Slots::Associative(map) => map.len(),
            Slots::Sequential(items) => items.iter().flatten().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied entries in container order.
    pub fn entries(&self) -> Vec<(ContainedId, &Slot)> {
        match &self.slots {
            Slots::Associative(map) => map
                .iter()
                .map(|(k, slot)| (ContainedId::from(k), slot))
                .collect(),
            Slots::Sequential(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.as_ref().map(|s| (ContainedId::Index(i), s)))
                .collect(),
        }
    }

    /// Live objects in container order; dead and unreadable entries are
    /// skipped.
    pub fn live(&self, db: &ContainedDatabase) -> Vec<Arc<dyn Contained>> {
        self.entries()
            .into_iter()
            .filter_map(|(_, slot)| slot.resolve(db).ok().flatten())
            .collect()
    }

    pub fn slot(&self, id: &ContainedId) -> Option<&Slot> {
        match &self.slots {
            Slots::Associative(map) => map.get(&id.to_string()),
            Slots::Sequential(items) => id
                .as_index()
                .and_then(|i| items.get(i))
                .and_then(Option::as_ref),
        }
    }

    /// The live object stored under `id`. Sequential containers also find
    /// entries by the object's own keyed id, which a referencing container
    /// keeps from the store that owns the object.
    pub fn get(&self, id: &ContainedId, db: &ContainedDatabase) -> Option<Arc<dyn Contained>> {
        if let Slots::Sequential(_) = &self.slots {
            if id.as_index().is_none() {
                return self
                    .live(db)
                    .into_iter()
                    .find(|obj| obj.meta().id().as_ref() == Some(id));
            }
        }
        self.slot(id)?.resolve(db).ok().flatten()
    }

    /// Whether `id` is held by a live, intact entry other than `obj`.
    pub(crate) fn is_taken(&self, id: &ContainedId, obj: &dyn Contained, db: &ContainedDatabase) -> bool {
        match self.slot(id) {
            None => false,
            Some(slot) => match slot.resolve(db) {
                Ok(Some(existing)) if same_object(existing.as_ref(), obj) => false,
                _ => !slot.is_vacant(db),
            },
        }
    }

    /// Whether `obj` is already stored under `id`.
    pub(crate) fn holds_at(&self, id: &ContainedId, obj: &dyn Contained, db: &ContainedDatabase) -> bool {
        matches!(
            self.slot(id).map(|slot| slot.resolve(db)),
            Some(Ok(Some(existing))) if same_object(existing.as_ref(), obj)
        )
    }

    /// Store a slot. Associative containers key it by `id`; sequential
    /// containers append and return the new position.
    pub(crate) fn put(&mut self, id: Option<&ContainedId>, slot: Slot) -> ContainedId {
        match &mut self.slots {
            Slots::Associative(map) => {
                let key = id.map(ContainedId::to_string).unwrap_or_default();
                map.insert(&key, slot);
                ContainedId::Key(key)
            }
            Slots::Sequential(items) => {
                items.push(Some(slot));
                ContainedId::Index(items.len() - 1)
            }
        }
    }

    /// Remove the entry holding `target`.
    ///
    /// Associative containers try the target's own id first. Otherwise
    /// entries are compared in order, and an entry that cannot be
    /// dereferenced before the match makes the removal ambiguous.
    pub fn remove_equal(&mut self, target: &dyn Contained, db: &ContainedDatabase) -> Removal {
        if let Some(id) = target.meta().id() {
            if self.holds_at(&id, target, db) {
                if let Slots::Associative(map) = &mut self.slots {
                    if let Some((_, slot)) = map.remove(&id.to_string()) {
                        if let Ok(Some(obj)) = slot.resolve(db) {
                            return Removal::Removed(obj);
                        }
                    }
                }
            }
        }

        let mut found = None;
        for (id, slot) in self.entries() {
            match slot.resolve(db) {
                Ok(Some(obj)) if same_object(obj.as_ref(), target) => {
                    found = Some((id, obj));
                    break;
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => return Removal::TypeMismatch,
            }
        }
        let Some((id, obj)) = found else {
            return Removal::NotFound;
        };
        match &mut self.slots {
            Slots::Associative(map) => {
                map.remove(&id.to_string());
            }
            Slots::Sequential(items) => {
                if let Some(slot) = id.as_index().and_then(|i| items.get_mut(i)) {
                    *slot = None;
                }
            }
        }
        Removal::Removed(obj)
    }

    /// Clear `target` and every entry that no longer resolves from a
    /// sequential container. Positions are kept, so the ids of surviving
    /// entries stay valid. Returns the cleared target.
    pub fn compact(
        &mut self,
        target: &dyn Contained,
        db: &ContainedDatabase,
    ) -> Option<Arc<dyn Contained>> {
        let Slots::Sequential(items) = &mut self.slots else {
            return None;
        };
        let mut matched = None;
        for entry in items.iter_mut() {
            let Some(slot) = entry.as_ref() else {
                continue;
            };
            match slot.resolve(db) {
                Ok(Some(obj)) if same_object(obj.as_ref(), target) => {
                    debug!(entry = ?slot, "dropping matched entry during compaction");
                    matched = Some(obj);
                    *entry = None;
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => {
                    debug!(entry = ?slot, "dropping dangling entry during compaction");
                    *entry = None;
                }
            }
        }
        matched
    }

    /// Remove entries whose backing object is broken or unreadable.
    /// Sequential containers are left alone.
    pub fn clean_broken(&mut self, db: &ContainedDatabase) -> usize {
        let Slots::Associative(map) = &mut self.slots else {
            return 0;
        };
        let before = map.len();
        map.retain(|key, slot| {
            let broken = slot.is_broken(db);
            if broken {
                debug!(key, "removing broken entry");
            }
            !broken
        });
        before - map.len()
    }

    /// Whether `obj` satisfies this container's type constraint.
    pub fn accepts(&self, obj: &dyn Contained) -> bool {
        match &self.constraint {
            None => true,
            Some(constraint) => obj.provides().contains(&constraint.contained_type),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// The persisted form of the container.
    ///
    /// Associative containers persist as one inline bucket holding their
    /// entries plus the `"Last Modified"` slot. Sequential containers
    /// persist as `("Last Modified", t, (entries...))`.
    pub fn to_state(&self) -> StateValue {
        match &self.slots {
            Slots::Associative(map) => {
                let mut pairs: Vec<(String, StateValue)> = map
                    .iter()
                    .map(|(k, slot)| (k.to_string(), slot.state()))
                    .collect();
                pairs.push((
                    LAST_MODIFIED.to_string(),
                    StateValue::Float(self.modified.value()),
                ));
                pairs.sort_by(|a, b| a.0.cmp(&b.0));
                encode_bucket(pairs.into_iter().map(|(k, v)| (StateValue::Str(k), v)))
            }
            Slots::Sequential(items) => StateValue::Tuple(vec![
                StateValue::Str(LAST_MODIFIED.to_string()),
                StateValue::Float(self.modified.value()),
                StateValue::Tuple(
                    items
                        .iter()
                        .map(|slot| slot.as_ref().map_or(StateValue::None, Slot::state))
                        .collect(),
                ),
            ]),
        }
    }

    /// Replace the contents with a persisted state.
    pub fn apply_state(&mut self, state: &StateValue, db: &ContainedDatabase) -> StoreResult<()> {
        match &mut self.slots {
            Slots::Associative(map) => {
                let mut rebuilt = KeyedMap::new(map.policy());
                for (key, value) in decode_bucket(state)? {
                    let StateValue::Str(key) = key else {
                        return Err(malformed("non-string container key"));
                    };
                    if key == LAST_MODIFIED {
                        if let Some(t) = value.as_float() {
                            self.modified = ModTime::at(t);
                        }
                        continue;
                    }
                    if let Some(slot) = Slot::from_state(&value, db) {
                        rebuilt.insert(&key, slot);
                    }
                }
                *map = rebuilt;
            }
            Slots::Sequential(items) => {
                let [_, StateValue::Float(t), StateValue::Tuple(persisted)] =
                    state.as_tuple().unwrap_or_default()
                else {
                    return Err(malformed("not a sequential container state"));
                };
                self.modified = ModTime::at(*t);
                *items = persisted
                    .iter()
                    .map(|value| Slot::from_state(value, db))
                    .collect();
            }
        }
        Ok(())
    }

    /// Write the container's state, merging with concurrent commits, then
    /// reload the merged result.
    pub fn commit(&mut self, db: &ContainedDatabase) -> StoreResult<Oid> {
        let oid = self.persistence.bind_with(|| db.new_oid());
        self.serial = db.store_state(oid, self.serial, self.to_state(), Some(&LastModifiedResolver))?;
        self.refresh(db)?;
        Ok(oid)
    }

    /// Reload the latest committed state, if any.
    pub fn refresh(&mut self, db: &ContainedDatabase) -> StoreResult<()> {
        let Some(oid) = self.persistence.oid() else {
            return Ok(());
        };
        if let Some((serial, state)) = db.load_state(oid)? {
            self.apply_state(&state, db)?;
            self.serial = serial;
        }
        Ok(())
    }

    /// Load a committed container. The kind follows the persisted shape.
    pub fn load(oid: Oid, ownership: Ownership, db: &ContainedDatabase) -> StoreResult<Self> {
        let Some((serial, state)) = db.load_state(oid)? else {
            return Err(StoreError::NoState(oid));
        };
        let kind = if decode_bucket(&state).is_ok() {
            ContainerKind::Associative
        } else {
            ContainerKind::Sequential
        };
        let mut container = Self::new(kind, ownership);
        container.persistence = PersistenceCell::bound(oid);
        container.apply_state(&state, db)?;
        container.serial = serial;
        Ok(container)
    }

    /// An independent copy sharing the persisted identity.
    pub fn working_copy(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            ownership: self.ownership,
            modified: self.modified,
            constraint: self.constraint.clone(),
            persistence: self
                .persistence
                .oid()
                .map_or_else(PersistenceCell::new, PersistenceCell::bound),
            serial: self.serial,
        }
    }
}

fn malformed(reason: &str) -> StoreError {
    StoreError::UnresolvableConflict {
        reason: reason.to_string(),
    }
}
