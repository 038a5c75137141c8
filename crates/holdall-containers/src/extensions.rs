use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use holdall_externalize::{Capability, ExternalMap};

use crate::contained::Contained;

/// Callback run with an object the store just added, returned or removed.
pub type Hook = Arc<dyn Fn(&Arc<dyn Contained>) + Send + Sync>;

/// Builds a contained object from external data.
pub type Factory = Arc<dyn Fn(&ExternalMap) -> Option<Arc<dyn Contained>> + Send + Sync>;

/// Per-process behavior attached to a store.
///
/// Never persisted: changing an extension does not mark the store
/// changed, and working copies share the same extensions.
#[derive(Clone, Default)]
pub struct RuntimeExtensions {
    pub(crate) after_add: Option<Hook>,
    pub(crate) after_get: Option<Hook>,
    pub(crate) after_delete: Option<Hook>,
    pub(crate) factories: HashMap<Capability, Factory>,
}

impl RuntimeExtensions {
    pub(crate) fn after_add(&self, obj: &Arc<dyn Contained>) {
        if let Some(hook) = &self.after_add {
            hook(obj);
        }
    }

    pub(crate) fn after_get(&self, obj: &Arc<dyn Contained>) {
        if let Some(hook) = &self.after_get {
            hook(obj);
        }
    }

    pub(crate) fn after_delete(&self, obj: &Arc<dyn Contained>) {
        if let Some(hook) = &self.after_delete {
            hook(obj);
        }
    }

    pub(crate) fn factory(&self, capability: &Capability) -> Option<&Factory> {
        self.factories.get(capability)
    }
}

impl fmt::Debug for RuntimeExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeExtensions")
            .field("after_add", &self.after_add.is_some())
            .field("after_get", &self.after_get.is_some())
            .field("after_delete", &self.after_delete.is_some())
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
