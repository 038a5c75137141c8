use std::sync::Arc;

use holdall_externalize::{
    Capability, ExternalIdGenerator, ExternalMap, ExternalizationConfig, NtiidGenerator,
};
use holdall_merge::LastModifiedResolver;
use holdall_store::bucket::{decode_bucket, encode_bucket};
use holdall_store::{InMemoryDatabase, PersistenceCell, Serial, StateValue};
use holdall_types::fields::LAST_MODIFIED;
use holdall_types::{is_synthetic_key, ContainedId, ModTime, Oid, Timestamp};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::{ContainerKind, LogLevel, StoreConfig};
use crate::contained::{same_object, Contained};
use crate::container::{ContainedDatabase, Container, Ownership, Removal, Slot};
use crate::error::{ContainedObjectValueError, ContainerError, ContainerResult};
use crate::extensions::RuntimeExtensions;
use crate::keys::KeyedMap;
use crate::tracked::ModTrackedList;

/// The persisted part of a store: its containers and bookkeeping.
#[derive(Debug)]
pub struct StoreState {
    containers: KeyedMap<Container>,
    modified: ModTime,
    persistence: PersistenceCell,
    serial: Serial,
    changed: bool,
}

impl StoreState {
    fn new(config: &StoreConfig) -> Self {
        Self {
            containers: KeyedMap::new(config.container_keys),
            modified: ModTime::zero(),
            persistence: PersistenceCell::new(),
            serial: 0,
            changed: false,
        }
    }

    pub fn last_modified(&self) -> Timestamp {
        self.modified.value()
    }

    pub fn serial(&self) -> Serial {
        self.serial
    }

    /// Whether anything persisted changed since the last commit.
    pub fn is_changed(&self) -> bool {
        self.changed
    }
}

/// Storage for contained objects, grouped into containers by container id.
///
/// Objects are added and removed through the store, which assigns ids,
/// keeps container and store modification times in step, and runs the
/// registered hooks.
pub struct ContainerStore {
    config: StoreConfig,
    state: StoreState,
    runtime: RuntimeExtensions,
    db: Arc<ContainedDatabase>,
    ids: Arc<dyn ExternalIdGenerator>,
}

impl ContainerStore {
    /// A store backed by a fresh in-memory database.
    pub fn new(config: StoreConfig) -> Self {
        let db: Arc<ContainedDatabase> = Arc::new(InMemoryDatabase::<dyn Contained>::new());
        Self::with_database(config, db)
    }

    /// A store backed by `db`. Weak stores must share the database of the
    /// store that owns their objects.
    pub fn with_database(config: StoreConfig, db: Arc<ContainedDatabase>) -> Self {
        Self {
            state: StoreState::new(&config),
            config,
            runtime: RuntimeExtensions::default(),
            db,
            ids: Arc::new(NtiidGenerator::from_config(
                &ExternalizationConfig::default(),
            )),
        }
    }

    /// Use `ids` to derive identifiers for objects added without one.
    pub fn with_id_generator(mut self, ids: Arc<dyn ExternalIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<ContainedDatabase> {
        &self.db
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn is_changed(&self) -> bool {
        self.state.changed
    }

    pub fn last_modified(&self) -> Timestamp {
        self.state.modified.value()
    }

    pub fn oid(&self) -> Option<Oid> {
        self.state.persistence.oid()
    }

    fn ownership(&self) -> Ownership {
        if self.config.weak {
            Ownership::References
        } else {
            Ownership::Owns
        }
    }

    // -----------------------------------------------------------------------
    // Contained objects
    // -----------------------------------------------------------------------

    /// Add `obj` to the container named by its container id, creating the
    /// container if needed. Returns the object.
    ///
    /// Re-adding an object already stored under its id is a no-op.
    pub fn add_contained_object(
        &mut self,
        obj: Arc<dyn Contained>,
    ) -> ContainerResult<Arc<dyn Contained>> {
        let db = Arc::clone(&self.db);
        let container_id = obj
            .meta()
            .container_id()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| invalid(obj.as_ref(), "Contained object has no containerId"))?;

        let existing = self.state.containers.get(&container_id);
        let kind = existing.map_or(self.config.container_kind, Container::kind);
        let current_id = obj.meta().id();

        if kind == ContainerKind::Associative {
            if !obj.is_locatable() {
                return Err(invalid(obj.as_ref(), "Contained object is not locatable"));
            }
            if let Some(ContainedId::Key(key)) = &current_id {
                if is_synthetic_key(key) {
                    return Err(invalid(obj.as_ref(), "Contained object uses a reserved id"));
                }
            }
        }

        if let Some(container) = existing {
            if kind == ContainerKind::Sequential
                && container
                    .live(db.as_ref())
                    .iter()
                    .any(|held| same_object(held.as_ref(), obj.as_ref()))
            {
                debug!(container = %container_id, "object already stored");
                return Ok(obj);
            }
            if let Some(id) = &current_id {
                if container.holds_at(id, obj.as_ref(), db.as_ref()) {
                    debug!(container = %container_id, %id, "object already stored");
                    return Ok(obj);
                }
                if kind == ContainerKind::Associative
                    && container.is_taken(id, obj.as_ref(), db.as_ref())
                {
                    return Err(ContainerError::IdInUse {
                        container_id,
                        id: id.to_string(),
                    });
                }
            }
            if !container.accepts(obj.as_ref()) {
                return Err(ContainerError::InvalidItemType {
                    container: container_id,
                    expected: container
                        .constraint()
                        .map(|c| c.contained_type.to_string())
                        .unwrap_or_default(),
                    id: current_id.map(|id| id.to_string()).unwrap_or_default(),
                });
            }
        }
        if current_id.is_none() && !self.config.set_ids {
            return Err(invalid(
                obj.as_ref(),
                "Contained object has no id and the store does not assign ids",
            ));
        }

        let oid = db.register(&obj)?;
        if let Some(creator) = self.config.creator_name() {
            if obj.meta().creator().is_none() {
                obj.meta().set_creator(Some(creator));
            }
        }

        let (default_kind, ownership) = (self.config.container_kind, self.ownership());
        if !self.state.containers.contains_key(&container_id) {
            debug!(container = %container_id, kind = ?default_kind, "creating container");
            self.state.changed = true;
        }
        let container = self
            .state
            .containers
            .get_or_insert_with(&container_id, || Container::new(default_kind, ownership));

        let slot = match container.ownership() {
            Ownership::Owns => Slot::Strong(Arc::clone(&obj)),
            Ownership::References => Slot::Weak(oid),
        };
        match container.kind() {
            ContainerKind::Associative => {
                let target: &dyn Contained = obj.as_ref();
                let id = match current_id {
                    Some(id) => id,
                    None => {
                        let id = obj
                            .container_key()
                            .filter(|key| !key.is_empty() && !is_synthetic_key(key))
                            .map(ContainedId::Key)
                            .filter(|id| !container.is_taken(id, target, db.as_ref()))
                            .or_else(|| self.ids.external_id(target).map(ContainedId::Key))
                            .unwrap_or_else(|| ContainedId::Key(Uuid::now_v7().to_string()));
                        obj.meta().set_id(Some(id.clone()));
                        id
                    }
                };
                container.put(Some(&id), slot);
            }
            ContainerKind::Sequential => {
                let position = container.put(None, slot);
                // A referencing container keeps the id the owning store gave.
                if self.config.set_ids
                    && (current_id.is_none() || container.ownership() == Ownership::Owns)
                {
                    obj.meta().set_id(Some(position));
                }
            }
        }

        roll_up(&mut self.state.modified, container);
        self.state.changed = true;
        debug!(container = %container_id, %oid, "added contained object");
        self.runtime.after_add(&obj);
        Ok(obj)
    }

    /// The object stored under `id` in `container_id`, if any.
    pub fn get_contained_object(
        &self,
        container_id: &str,
        id: impl Into<ContainedId>,
    ) -> Option<Arc<dyn Contained>> {
        let found = self.lookup(container_id, &id.into())?;
        self.runtime.after_get(&found);
        Some(found)
    }

    /// Like [`get_contained_object`](Self::get_contained_object), returning
    /// `default` when nothing is found. The get hook is skipped when the
    /// result is `default` itself.
    pub fn get_contained_object_or(
        &self,
        container_id: &str,
        id: impl Into<ContainedId>,
        default: Arc<dyn Contained>,
    ) -> Arc<dyn Contained> {
        match self.lookup(container_id, &id.into()) {
            Some(found) if !same_object(found.as_ref(), default.as_ref()) => {
                self.runtime.after_get(&found);
                found
            }
            _ => default,
        }
    }

    fn lookup(&self, container_id: &str, id: &ContainedId) -> Option<Arc<dyn Contained>> {
        self.state
            .containers
            .get(container_id)?
            .get(id, self.db.as_ref())
    }

    /// Remove the object stored under `id`. Returns the removed object, or
    /// `None` if there was nothing to remove.
    pub fn delete_contained_object(
        &mut self,
        container_id: &str,
        id: impl Into<ContainedId>,
    ) -> ContainerResult<Option<Arc<dyn Contained>>> {
        let id = id.into();
        match self.lookup(container_id, &id) {
            Some(obj) => self.delete_equal_contained_object(&obj),
            None => {
                log_missing(self.config.missing_delete_level, container_id, &id.to_string());
                Ok(None)
            }
        }
    }

    /// Remove `obj` from its container. Returns the removed object, or
    /// `None` if the store does not hold it.
    ///
    /// A sequential container that holds dangling references ahead of the
    /// object is compacted instead; an associative one reports the removal
    /// as ambiguous. Compaction counts as a removal when it clears `obj`:
    /// the object is returned, the container time advances and the delete
    /// hook runs. When `obj` is not among the cleared entries the result is
    /// `None` and no hook runs.
    pub fn delete_equal_contained_object(
        &mut self,
        obj: &Arc<dyn Contained>,
    ) -> ContainerResult<Option<Arc<dyn Contained>>> {
        let level = self.config.missing_delete_level;
        let describe = || obj.describe();
        let Some(container_id) = obj.meta().container_id() else {
            log_missing(level, "", &describe());
            return Ok(None);
        };
        let db = Arc::clone(&self.db);
        let Some(container) = self.state.containers.get_mut(&container_id) else {
            log_missing(level, &container_id, &describe());
            return Ok(None);
        };

        let removed = match container.remove_equal(obj.as_ref(), db.as_ref()) {
            Removal::Removed(removed) => removed,
            Removal::NotFound => {
                log_missing(level, &container_id, &describe());
                return Ok(None);
            }
            Removal::TypeMismatch => match container.kind() {
                ContainerKind::Associative => {
                    return Err(ContainerError::AmbiguousRemoval { container_id });
                }
                ContainerKind::Sequential => {
                    debug!(container = %container_id, "compacting after unresolvable entry");
                    self.state.changed = true;
                    match container.compact(obj.as_ref(), db.as_ref()) {
                        Some(removed) => removed,
                        None => {
                            log_missing(level, &container_id, &describe());
                            return Ok(None);
                        }
                    }
                }
            },
        };

        roll_up(&mut self.state.modified, container);
        self.state.changed = true;
        self.runtime.after_delete(&removed);
        Ok(Some(removed))
    }

    /// Remove entries whose backing object is broken or unreadable from
    /// every associative container. Returns the number removed.
    pub fn clean_broken(&mut self) -> usize {
        let db = Arc::clone(&self.db);
        let mut removed = 0;
        for (container_id, container) in self.state.containers.iter_mut() {
            let count = container.clean_broken(db.as_ref());
            if count > 0 {
                debug!(container = container_id, count, "cleaned broken entries");
                roll_up(&mut self.state.modified, container);
                removed += count;
            }
        }
        if removed > 0 {
            info!(removed, "removed broken entries");
            self.state.changed = true;
        }
        removed
    }

    /// Every live contained object, container by container.
    pub fn iter_contained(&self) -> impl Iterator<Item = Arc<dyn Contained>> + '_ {
        self.state
            .containers
            .values()
            .flat_map(move |container| container.live(self.db.as_ref()))
    }

    /// Collect the live objects of several containers into one list
    /// stamped with the newest container time.
    pub fn gather(&self, container_ids: &[&str]) -> ModTrackedList<Arc<dyn Contained>> {
        let mut list = ModTrackedList::new();
        for container_id in container_ids {
            if let Some(container) = self.state.containers.get(container_id) {
                list.extend_at(container.live(self.db.as_ref()), container.last_modified());
            }
        }
        list
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    pub fn get_container(&self, container_id: &str) -> Option<&Container> {
        self.state.containers.get(container_id)
    }

    pub fn get_container_mut(&mut self, container_id: &str) -> Option<&mut Container> {
        self.state.containers.get_mut(container_id)
    }

    /// The named container, created with the configured kind if missing.
    pub fn get_or_create_container(&mut self, container_id: &str) -> &mut Container {
        let (kind, ownership) = (self.config.container_kind, self.ownership());
        if !self.state.containers.contains_key(container_id) {
            debug!(container = container_id, ?kind, "creating container");
            self.state.changed = true;
        }
        self.state
            .containers
            .get_or_insert_with(container_id, || Container::new(kind, ownership))
    }

    /// Install an externally built container. It may be of a different
    /// kind than the store's default.
    pub fn add_container(&mut self, container_id: &str, container: Container) -> ContainerResult<()> {
        if self.state.containers.contains_key(container_id) {
            return Err(ContainerError::ContainerExists(container_id.to_string()));
        }
        self.state.containers.insert(container_id, container);
        self.state.changed = true;
        Ok(())
    }

    pub fn delete_container(&mut self, container_id: &str) -> ContainerResult<Container> {
        let (_, container) = self
            .state
            .containers
            .remove(container_id)
            .ok_or_else(|| ContainerError::NoSuchContainer(container_id.to_string()))?;
        self.state.modified.update(None);
        self.state.changed = true;
        Ok(container)
    }

    pub fn contains_container(&self, container_id: &str) -> bool {
        self.state.containers.contains_key(container_id)
    }

    pub fn container_ids(&self) -> impl Iterator<Item = &str> {
        self.state.containers.keys()
    }

    pub fn containers(&self) -> impl Iterator<Item = (&str, &Container)> {
        self.state.containers.iter()
    }

    // -----------------------------------------------------------------------
    // Runtime extensions
    // -----------------------------------------------------------------------

    pub fn set_after_add(&mut self, hook: impl Fn(&Arc<dyn Contained>) + Send + Sync + 'static) {
        self.runtime.after_add = Some(Arc::new(hook));
    }

    pub fn set_after_get(&mut self, hook: impl Fn(&Arc<dyn Contained>) + Send + Sync + 'static) {
        self.runtime.after_get = Some(Arc::new(hook));
    }

    pub fn set_after_delete(
        &mut self,
        hook: impl Fn(&Arc<dyn Contained>) + Send + Sync + 'static,
    ) {
        self.runtime.after_delete = Some(Arc::new(hook));
    }

    /// Register how objects providing `capability` are built from
    /// external data.
    pub fn register_factory(
        &mut self,
        capability: Capability,
        factory: impl Fn(&ExternalMap) -> Option<Arc<dyn Contained>> + Send + Sync + 'static,
    ) {
        self.runtime.factories.insert(capability, Arc::new(factory));
    }

    /// Build an object for the homogeneous container `datatype` from
    /// external data. `None` if the container is unknown, unconstrained,
    /// or has no factory for its contained type.
    pub fn maybe_create_contained_object_with_type(
        &self,
        datatype: &str,
        external: &ExternalMap,
    ) -> Option<Arc<dyn Contained>> {
        let constraint = self.state.containers.get(datatype)?.constraint()?;
        let factory = self.runtime.factory(&constraint.contained_type)?;
        factory(external)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write every container and the containers map. Concurrent commits to
    /// the same records are merged; the store then reloads the merged
    /// state.
    pub fn commit(&mut self) -> ContainerResult<()> {
        let db = Arc::clone(&self.db);
        let mut pairs = Vec::with_capacity(self.state.containers.len() + 1);
        for (container_id, container) in self.state.containers.iter_mut() {
            let oid = container.commit(db.as_ref())?;
            pairs.push((container_id.to_string(), StateValue::Ref(oid)));
        }
        pairs.push((
            LAST_MODIFIED.to_string(),
            StateValue::Float(self.state.modified.value()),
        ));
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let oid = self.state.persistence.bind_with(|| db.new_oid());
        let state = encode_bucket(pairs.into_iter().map(|(k, v)| (StateValue::Str(k), v)));
        self.state.serial = db.store_state(oid, self.state.serial, state, Some(&LastModifiedResolver))?;
        self.refresh()?;
        self.state.changed = false;
        debug!(%oid, serial = self.state.serial, "committed store");
        Ok(())
    }

    /// Reload the latest committed containers map. Containers committed by
    /// others are loaded; local containers that were committed but are no
    /// longer in the map are dropped.
    pub fn refresh(&mut self) -> ContainerResult<()> {
        let Some(oid) = self.state.persistence.oid() else {
            return Ok(());
        };
        let Some((serial, state)) = self.db.load_state(oid)? else {
            return Ok(());
        };
        let db = Arc::clone(&self.db);
        let ownership = self.ownership();

        let mut committed = KeyedMap::new(self.config.container_keys);
        let mut loaded = Vec::new();
        for (key, value) in decode_bucket(&state)? {
            let (StateValue::Str(key), value) = (key, value) else {
                continue;
            };
            if key == LAST_MODIFIED {
                self.state.modified.update_if_greater(value.as_float());
                continue;
            }
            let StateValue::Ref(container_oid) = value else {
                warn!(container = %key, "containers map entry is not a reference");
                continue;
            };
            match self.state.containers.get_mut(&key) {
                Some(container) if container.oid() == Some(container_oid) => {
                    container.refresh(db.as_ref())?;
                }
                _ => loaded.push((key.clone(), Container::load(container_oid, ownership, db.as_ref())?)),
            }
            committed.insert(&key, ());
        }

        self.state
            .containers
            .retain(|key, container| container.oid().is_none() || committed.contains_key(key));
        for (key, container) in loaded {
            self.state.containers.insert(&key, container);
        }
        for container in self.state.containers.values() {
            self.state.modified.update_if_greater(Some(container.last_modified()));
        }
        self.state.serial = serial;
        Ok(())
    }

    /// An independent view of the store sharing its database, as a second
    /// transaction would see it.
    pub fn working_copy(&self) -> ContainerStore {
        let mut containers = KeyedMap::new(self.config.container_keys);
        for (key, container) in self.state.containers.iter() {
            containers.insert(key, container.working_copy());
        }
        ContainerStore {
            config: self.config.clone(),
            state: StoreState {
                containers,
                modified: self.state.modified,
                persistence: self
                    .state
                    .persistence
                    .oid()
                    .map_or_else(PersistenceCell::new, PersistenceCell::bound),
                serial: self.state.serial,
                changed: self.state.changed,
            },
            runtime: self.runtime.clone(),
            db: Arc::clone(&self.db),
            ids: Arc::clone(&self.ids),
        }
    }
}

impl std::fmt::Debug for ContainerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerStore")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

/// Advance the store, bring the container up to it, then let the store
/// catch up with the container. The store never trails a container.
fn roll_up(store: &mut ModTime, container: &mut Container) {
    store.update(None);
    let t = container.touch(Some(store.value()));
    store.update_if_greater(Some(t));
}

fn invalid(obj: &dyn Contained, message: &str) -> ContainerError {
    ContainedObjectValueError {
        message: message.to_string(),
        type_name: obj.type_name().to_string(),
        repr: obj.describe(),
    }
    .into()
}

fn log_missing(level: LogLevel, container_id: &str, target: &str) {
    match level {
        LogLevel::Trace => trace!(container = container_id, target, "nothing to delete"),
        LogLevel::Debug => debug!(container = container_id, target, "nothing to delete"),
        LogLevel::Info => info!(container = container_id, target, "nothing to delete"),
        LogLevel::Warn => warn!(container = container_id, target, "nothing to delete"),
        LogLevel::Error => error!(container = container_id, target, "nothing to delete"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::contained::ContainedRecord;

    fn note(container_id: &str) -> Arc<dyn Contained> {
        Arc::new(ContainedRecord::new("Note", container_id))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn rejects_missing_container_id() {
        let mut store = ContainerStore::new(StoreConfig::default());
        let Err(err) = store.add_contained_object(note("")) else {
            panic!("object without a container id was accepted");
        };
        assert!(matches!(err, ContainerError::Validation(_)));
        assert!(err.to_string().contains("has no containerId"));
        assert!(!store.is_changed());
    }

    #[test]
    fn associative_store_requires_locatable_objects() {
        let mut store = ContainerStore::new(StoreConfig::default());
        let obj: Arc<dyn Contained> = Arc::new(ContainedRecord::new("Note", "c").not_locatable());
        assert!(matches!(
            store.add_contained_object(obj),
            Err(ContainerError::Validation(_))
        ));

        let mut seq = ContainerStore::new(
            StoreConfig::default().with_container_kind(ContainerKind::Sequential),
        );
        let obj: Arc<dyn Contained> = Arc::new(ContainedRecord::new("Note", "c").not_locatable());
        assert!(seq.add_contained_object(obj).is_ok());
    }

    #[test]
    fn synthetic_keys_are_not_ids() {
        let mut store = ContainerStore::new(StoreConfig::default());
        let obj: Arc<dyn Contained> =
            Arc::new(ContainedRecord::new("Note", "c").with_id(LAST_MODIFIED));
        assert!(matches!(
            store.add_contained_object(obj),
            Err(ContainerError::Validation(_))
        ));
    }

    #[test]
    fn no_id_without_assignment_is_invalid() {
        let mut store = ContainerStore::new(StoreConfig::default().with_set_ids(false));
        assert!(matches!(
            store.add_contained_object(note("c")),
            Err(ContainerError::Validation(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Ids
    // -----------------------------------------------------------------------

    #[test]
    fn container_key_used_when_free() {
        let mut store = ContainerStore::new(StoreConfig::default());
        let first: Arc<dyn Contained> = Arc::new(ContainedRecord::new("Note", "c").with_key("k"));
        let second: Arc<dyn Contained> = Arc::new(ContainedRecord::new("Note", "c").with_key("k"));
        store.add_contained_object(first.clone()).unwrap();
        store.add_contained_object(second.clone()).unwrap();

        assert_eq!(first.meta().id(), Some(ContainedId::from("k")));
        let fallback = second.meta().id().unwrap().to_string();
        assert!(fallback.starts_with("tag:"), "{fallback}");
        assert!(fallback.contains("-OID-0x"), "{fallback}");
    }

    #[test]
    fn creator_is_stamped() {
        let mut store = ContainerStore::new(
            StoreConfig::default()
                .with_creator(crate::config::CreatorPolicy::Owner)
                .with_owner("alice"),
        );
        let obj = store.add_contained_object(note("c")).unwrap();
        assert_eq!(obj.meta().creator().as_deref(), Some("alice"));
        assert!(obj.meta().id().unwrap().to_string().contains(":alice-OID-"));
    }

    #[test]
    fn case_insensitive_container_ids() {
        let mut store = ContainerStore::new(
            StoreConfig::default().with_container_keys(crate::keys::KeyPolicy::CaseInsensitive),
        );
        let obj = store.add_contained_object(note("Notes")).unwrap();
        let id = obj.meta().id().unwrap();
        assert!(store.get_contained_object("NOTES", id).is_some());
        assert_eq!(store.container_ids().collect::<Vec<_>>(), vec!["notes"]);
    }

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    #[test]
    fn add_container_refuses_existing() {
        let mut store = ContainerStore::new(StoreConfig::default());
        store.add_container("c", Container::sequential()).unwrap();
        assert_eq!(
            store.add_container("c", Container::associative()).unwrap_err(),
            ContainerError::ContainerExists("c".into())
        );
        assert_eq!(store.get_container("c").unwrap().kind(), ContainerKind::Sequential);
    }

    #[test]
    fn delete_container_requires_existing() {
        let mut store = ContainerStore::new(StoreConfig::default());
        assert!(matches!(
            store.delete_container("missing"),
            Err(ContainerError::NoSuchContainer(_))
        ));
        store.get_or_create_container("c");
        assert!(store.delete_container("c").is_ok());
        assert!(!store.contains_container("c"));
    }

    // -----------------------------------------------------------------------
    // Hooks
    // -----------------------------------------------------------------------

    #[test]
    fn hooks_run_and_do_not_mark_changed() {
        let mut store = ContainerStore::new(StoreConfig::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        store.set_after_get(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!store.is_changed());

        let obj = store.add_contained_object(note("c")).unwrap();
        let id = obj.meta().id().unwrap();
        store.get_contained_object("c", id.clone()).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let fallback = note("c");
        let got = store.get_contained_object_or("c", "missing", fallback.clone());
        assert!(same_object(got.as_ref(), fallback.as_ref()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_runs_hook_and_missing_returns_none() {
        let mut store = ContainerStore::new(StoreConfig::default());
        let deleted = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&deleted);
        store.set_after_delete(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let obj = store.add_contained_object(note("c")).unwrap();
        let id = obj.meta().id().unwrap();

        let removed = store.delete_contained_object("c", id.clone()).unwrap().unwrap();
        assert!(same_object(removed.as_ref(), obj.as_ref()));
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
        assert!(store.delete_contained_object("c", id).unwrap().is_none());
        assert!(store.delete_equal_contained_object(&note("elsewhere")).unwrap().is_none());
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
    }
}
