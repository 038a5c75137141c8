use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use holdall_types::fields::{
    CLASS, CONTAINER_ID, CREATED_TIME, CREATOR, ID, LAST_MODIFIED, LINKS, MIMETYPE, NTIID, OID,
};
use tracing::{debug, warn};

use crate::config::ExternalizationConfig;
use crate::externalizer::Externalizer;
use crate::links::externalize_links;
use crate::object::{Capability, ExternalForm, Externalizable, Member};
use crate::registry::{Adapter, Decorator};
use crate::value::{ExternalList, ExternalMap, ExternalValue, Location, OpaqueValue};

/// Rendering of an object whose backing storage could not be read.
pub const BROKEN_OBJECT: &str = "<Broken Object>";

/// Rendering of an object already being externalized higher up the same
/// call, when it has no identifier to stand in for it.
pub const RECURSIVE_REFERENCE: &str = "<recursive reference>";

/// State of one externalization: the active adapter name and the objects
/// currently being walked.
///
/// A call is created per top-level externalization and threaded through
/// every nested one, including those made by adapters and decorators.
/// Separate calls share nothing, so concurrent externalizations never see
/// each other's name.
pub struct ExternalizeCall<'e> {
    externalizer: &'e Externalizer,
    names: Vec<String>,
    in_progress: Vec<(usize, &'static str)>,
}

impl<'e> ExternalizeCall<'e> {
    pub(crate) fn new(externalizer: &'e Externalizer, name: &str) -> Self {
        Self {
            externalizer,
            names: vec![name.to_string()],
            in_progress: Vec::new(),
        }
    }

    pub fn externalizer(&self) -> &'e Externalizer {
        self.externalizer
    }

    pub fn config(&self) -> &'e ExternalizationConfig {
        self.externalizer.config()
    }

    /// The adapter name nested externalizations inherit.
    pub fn active_name(&self) -> &str {
        self.names.last().map_or("", String::as_str)
    }

    /// Number of objects currently being walked.
    pub fn depth(&self) -> usize {
        self.in_progress.len()
    }

    /// Make `name` the active adapter name until the returned scope drops.
    pub fn scoped_name(&mut self, name: &str) -> NameScope<'_, 'e> {
        self.names.push(name.to_string());
        NameScope { call: self }
    }

    /// Externalize `obj` under a different adapter name.
    pub fn externalize_with_name(&mut self, obj: &dyn Externalizable, name: &str) -> ExternalValue {
        let mut scope = self.scoped_name(name);
        scope.externalize(obj)
    }

    /// Externalize `obj` under the active adapter name.
    pub fn externalize(&mut self, obj: &dyn Externalizable) -> ExternalValue {
        if let Some(plain) = obj.as_plain() {
            return self.coerce(plain);
        }
        if obj.is_broken() {
            return ExternalValue::from(BROKEN_OBJECT);
        }

        let key = (address(obj), obj.type_name());
        if self.in_progress.contains(&key) || self.depth() >= self.config().max_depth {
            warn!(
                type_name = obj.type_name(),
                depth = self.depth(),
                "recursive externalization"
            );
            return ExternalValue::String(
                self.identify(obj)
                    .unwrap_or_else(|| RECURSIVE_REFERENCE.to_string()),
            );
        }

        self.in_progress.push(key);
        let mut result = match self.find_adapter(obj) {
            Some(adapter) => adapter.adapt(obj, self),
            None => match obj.to_external_object(self) {
                Some(rendered) => rendered,
                None => self.externalize_form(obj),
            },
        };
        if let ExternalValue::Map(map) = &mut result {
            self.decorate(obj, map);
        }
        self.in_progress.pop();
        result
    }

    pub fn externalize_member(&mut self, member: &Member<'_>) -> ExternalValue {
        match member {
            Member::Value(v) => self.externalize(v),
            Member::Ref(obj) => self.externalize(*obj),
            Member::Shared(obj) => self.externalize(obj.as_ref()),
        }
    }

    /// Build the standard mapping of `obj`: `merge_from` (or an empty map)
    /// plus every synthetic field the object's attributes imply.
    ///
    /// Seeded values win, except for the timestamps and the `Class` tag,
    /// which always come from the object.
    pub fn to_external_dictionary(
        &mut self,
        obj: &dyn Externalizable,
        merge_from: Option<ExternalMap>,
    ) -> ExternalMap {
        let mut result = merge_from.unwrap_or_default();
        let attrs = obj.standard();

        if let Some(id) = attrs.id {
            result.insert_if_absent(ID, id);
        }
        if let Some(oid) = attrs.oid {
            result.insert_if_absent(OID, oid.to_external());
        }
        if !result.contains_key(NTIID) {
            let ntiid = attrs
                .ntiid
                .or_else(|| self.externalizer.ids().external_id(obj));
            if let Some(ntiid) = ntiid {
                result.insert(NTIID, ntiid);
            }
        }
        if let Some(creator) = attrs.creator {
            result.insert_if_absent(CREATOR, creator);
        }
        if let Some(container_id) = attrs.container_id {
            result.insert_if_absent(CONTAINER_ID, container_id);
        }
        if let Some(t) = attrs.last_modified {
            result.insert(LAST_MODIFIED, t);
        }
        if let Some(t) = attrs.created_time {
            result.insert(CREATED_TIME, t);
        }

        let class_name = obj.class_name();
        if let Some(class_name) = &class_name {
            result.insert(CLASS, class_name.as_str());
        }
        match (attrs.mime_type, class_name) {
            (Some(mime_type), _) => {
                result.insert_if_absent(MIMETYPE, mime_type);
            }
            (None, Some(class_name)) => {
                result.insert_if_absent(MIMETYPE, self.config().mime_type_for(&class_name));
            }
            (None, None) => {}
        }

        let links = externalize_links(self, obj);
        if !links.is_empty() {
            result.insert_if_absent(LINKS, ExternalList::from(links));
        }

        result.set_location(Location::new(self.active_name(), self.identify(obj)));
        result
    }

    /// The best external identifier for `obj`: its portable id, a generated
    /// one, or its external OID.
    pub fn identify(&self, obj: &dyn Externalizable) -> Option<String> {
        let attrs = obj.standard();
        attrs
            .ntiid
            .or_else(|| self.externalizer.ids().external_id(obj))
            .or_else(|| attrs.oid.map(|oid| oid.to_external()))
    }

    fn externalize_form(&mut self, obj: &dyn Externalizable) -> ExternalValue {
        match obj.external_form() {
            ExternalForm::Scalar(v) => v,
            ExternalForm::Null => self.coerce(ExternalValue::Null),
            ExternalForm::Mapping(entries) => {
                let mut map = self.to_external_dictionary(obj, None);
                for (key, member) in &entries {
                    let value = self.externalize_member(member);
                    map.insert(key.as_str(), value);
                }
                ExternalValue::Map(map)
            }
            ExternalForm::Sequence(members) => {
                let mut list: ExternalList = members
                    .iter()
                    .map(|member| self.externalize_member(member))
                    .collect();
                list.set_location(Location::new(self.active_name(), self.identify(obj)));
                ExternalValue::List(list)
            }
            ExternalForm::Opaque => {
                debug!(type_name = obj.type_name(), "no externalization strategy");
                ExternalValue::Opaque(OpaqueValue {
                    type_name: obj.type_name().to_string(),
                })
            }
        }
    }

    fn find_adapter(&self, obj: &dyn Externalizable) -> Option<Arc<dyn Adapter>> {
        let externalizer = self.externalizer;
        let registry = externalizer.registry();
        let capabilities = capabilities_of(obj);
        let lookup = |name: &str| {
            capabilities
                .iter()
                .find_map(|cap| registry.lookup_adapter(cap, name))
        };

        let name = self.active_name();
        lookup(name).or_else(|| {
            if !name.is_empty() && self.config().fallback_to_default_name {
                lookup("")
            } else {
                None
            }
        })
    }

    fn decorate(&mut self, obj: &dyn Externalizable, map: &mut ExternalMap) {
        let externalizer = self.externalizer;
        let registry = externalizer.registry();
        let mut seen: Vec<*const ()> = Vec::new();
        let mut decorators: Vec<Arc<dyn Decorator>> = Vec::new();
        for cap in capabilities_of(obj) {
            for decorator in registry.lookup_decorators(&cap) {
                let ptr = Arc::as_ptr(&decorator) as *const ();
                if !seen.contains(&ptr) {
                    seen.push(ptr);
                    decorators.push(decorator);
                }
            }
        }
        for decorator in decorators {
            decorator.decorate(obj, map, self);
        }
    }

    fn coerce(&self, value: ExternalValue) -> ExternalValue {
        if value.is_null() && self.config().coerce_none {
            ExternalValue::Bool(false)
        } else {
            value
        }
    }
}

/// Guard returned by [`ExternalizeCall::scoped_name`]. Restores the
/// previous adapter name when dropped, including during unwinding.
pub struct NameScope<'c, 'e> {
    call: &'c mut ExternalizeCall<'e>,
}

impl<'e> Deref for NameScope<'_, 'e> {
    type Target = ExternalizeCall<'e>;

    fn deref(&self) -> &Self::Target {
        self.call
    }
}

impl DerefMut for NameScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.call
    }
}

impl Drop for NameScope<'_, '_> {
    fn drop(&mut self) {
        self.call.names.pop();
    }
}

fn capabilities_of(obj: &dyn Externalizable) -> Vec<Capability> {
    let mut capabilities = obj.provides();
    if !capabilities.contains(&Capability::ANY) {
        capabilities.push(Capability::ANY);
    }
    capabilities
}

// A field at offset zero shares its parent's address, so walked objects are
// keyed by address and type together.
fn address(obj: &dyn Externalizable) -> usize {
    obj as *const dyn Externalizable as *const () as usize
}
