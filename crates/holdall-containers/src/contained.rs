use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use holdall_externalize::{
    strip_synthetic_keys, Capability, ExternalForm, ExternalMap, ExternalValue, Externalizable,
    Member, StandardAttributes,
};
use holdall_store::{PersistenceCell, Persistent};
use holdall_types::fields::{CLASS, CONTAINER_ID, ID};
use holdall_types::{modtime, ContainedId, ModTime, Timestamp};

use crate::error::ContainedObjectValueError;

/// Capability provided by every contained object.
pub const CONTAINED: Capability = Capability::from_static("contained");

/// Bookkeeping carried by every contained object.
///
/// The container id and id are assigned by the store on insert, so they
/// live behind interior mutability and the object itself can be shared.
#[derive(Debug)]
pub struct ContainedMeta {
    container_id: RwLock<Option<String>>,
    id: RwLock<Option<ContainedId>>,
    creator: RwLock<Option<String>>,
    created_time: Timestamp,
    modified: RwLock<ModTime>,
    persistence: PersistenceCell,
}

impl ContainedMeta {
    pub fn new(container_id: Option<String>) -> Self {
        let now = modtime::now();
        Self {
            container_id: RwLock::new(container_id),
            id: RwLock::new(None),
            creator: RwLock::new(None),
            created_time: now,
            modified: RwLock::new(ModTime::at(now)),
            persistence: PersistenceCell::new(),
        }
    }

    pub fn container_id(&self) -> Option<String> {
        self.container_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_container_id(&self, container_id: Option<String>) {
        *self
            .container_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = container_id;
    }

    pub fn id(&self) -> Option<ContainedId> {
        self.id.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_id(&self, id: Option<ContainedId>) {
        *self.id.write().unwrap_or_else(PoisonError::into_inner) = id;
    }

    pub fn creator(&self) -> Option<String> {
        self.creator
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_creator(&self, creator: Option<String>) {
        *self.creator.write().unwrap_or_else(PoisonError::into_inner) = creator;
    }

    pub fn created_time(&self) -> Timestamp {
        self.created_time
    }

    pub fn last_modified(&self) -> Timestamp {
        self.modified
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .value()
    }

    /// Advance the modification time; see [`ModTime::update`].
    pub fn touch(&self, t: Option<Timestamp>) -> Timestamp {
        let mut modified = self.modified.write().unwrap_or_else(PoisonError::into_inner);
        modified.update(t);
        modified.value()
    }

    pub fn persistence(&self) -> &PersistenceCell {
        &self.persistence
    }

    /// Standard attributes derived from the bookkeeping fields.
    pub fn standard(&self) -> StandardAttributes {
        StandardAttributes {
            id: self.id().map(|id| id.to_string()),
            oid: self.persistence.oid(),
            container_id: self.container_id(),
            creator: self.creator(),
            last_modified: Some(self.last_modified()),
            created_time: Some(self.created_time),
            ..Default::default()
        }
    }
}

impl Default for ContainedMeta {
    fn default() -> Self {
        Self::new(None)
    }
}

/// An object that lives in exactly one container of a store.
pub trait Contained: Persistent + Externalizable {
    fn meta(&self) -> &ContainedMeta;

    /// A preferred key, used as the id when the object is added without
    /// one and the key is free.
    fn container_key(&self) -> Option<String> {
        None
    }

    /// Whether the object can be addressed by name. Associative
    /// containers only accept locatable objects.
    fn is_locatable(&self) -> bool {
        true
    }

    /// Short description used in validation errors.
    fn describe(&self) -> String {
        let meta = self.meta();
        format!(
            "{}(container_id={:?}, id={:?})",
            self.class_name()
                .unwrap_or_else(|| self.type_name().to_string()),
            meta.container_id(),
            meta.id().map(|id| id.to_string()),
        )
    }
}

/// Whether two handles point at the same object.
pub fn same_object(a: &dyn Contained, b: &dyn Contained) -> bool {
    std::ptr::addr_eq(a as *const dyn Contained, b as *const dyn Contained)
}

/// A generic contained object: a class tag plus free-form fields.
#[derive(Debug)]
pub struct ContainedRecord {
    meta: ContainedMeta,
    class_name: String,
    fields: ExternalMap,
    key: Option<String>,
    locatable: bool,
    broken: AtomicBool,
}

impl ContainedRecord {
    pub fn new(class_name: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            meta: ContainedMeta::new(Some(container_id.into())),
            class_name: class_name.into(),
            fields: ExternalMap::new(),
            key: None,
            locatable: true,
            broken: AtomicBool::new(false),
        }
    }

    /// Build a record from external data. `Class`, `ContainerId` and `ID`
    /// are taken from the data; other synthetic keys are dropped.
    pub fn from_external(mut data: ExternalMap) -> Result<Self, ContainedObjectValueError> {
        let class_name = data
            .get(CLASS)
            .and_then(ExternalValue::as_str)
            .unwrap_or("Object")
            .to_string();
        let Some(container_id) = data
            .get(CONTAINER_ID)
            .and_then(ExternalValue::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
        else {
            return Err(ContainedObjectValueError {
                message: "Contained object has no containerId".into(),
                type_name: class_name,
                repr: format!("{:?}", data.keys().collect::<Vec<_>>()),
            });
        };
        let id = match data.get(ID) {
            Some(ExternalValue::String(s)) => Some(ContainedId::from(s.as_str())),
            Some(ExternalValue::Int(i)) if *i >= 0 => Some(ContainedId::Index(*i as usize)),
            _ => None,
        };
        data.remove(CLASS);
        strip_synthetic_keys(&mut data);

        let record = Self::new(class_name, container_id).with_fields(data);
        record.meta.set_id(id);
        Ok(record)
    }

    pub fn with_id(self, id: impl Into<ContainedId>) -> Self {
        self.meta.set_id(Some(id.into()));
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<ExternalValue>) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn with_fields(mut self, mut fields: ExternalMap) -> Self {
        strip_synthetic_keys(&mut fields);
        for (k, v) in fields.iter() {
            self.fields.insert(k.as_str(), v.clone());
        }
        self
    }

    pub fn not_locatable(mut self) -> Self {
        self.locatable = false;
        self
    }

    pub fn class(&self) -> &str {
        &self.class_name
    }

    pub fn fields(&self) -> &ExternalMap {
        &self.fields
    }

    /// Flag the record's backing data as damaged.
    pub fn mark_broken(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl Persistent for ContainedRecord {
    fn persistence(&self) -> &PersistenceCell {
        self.meta.persistence()
    }
}

impl Externalizable for ContainedRecord {
    fn provides(&self) -> Vec<Capability> {
        vec![Capability::new(self.class_name.to_lowercase()), CONTAINED]
    }

    fn class_name(&self) -> Option<String> {
        Some(self.class_name.clone())
    }

    fn standard(&self) -> StandardAttributes {
        self.meta.standard()
    }

    fn external_form(&self) -> ExternalForm<'_> {
        ExternalForm::Mapping(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), Member::Ref(v)))
                .collect(),
        )
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

impl Contained for ContainedRecord {
    fn meta(&self) -> &ContainedMeta {
        &self.meta
    }

    fn container_key(&self) -> Option<String> {
        self.key.clone()
    }

    fn is_locatable(&self) -> bool {
        self.locatable
    }
}
