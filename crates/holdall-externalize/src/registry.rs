use std::collections::HashMap;
use std::sync::Arc;

use crate::call::ExternalizeCall;
use crate::config::ExternalizationConfig;
use crate::decorators::MimeTypeDecorator;
use crate::links::LinkDecorator;
use crate::object::{Capability, Externalizable};
use crate::value::{ExternalMap, ExternalValue};

/// Produces the external form of objects providing a capability.
pub trait Adapter: Send + Sync {
    fn adapt(&self, obj: &dyn Externalizable, call: &mut ExternalizeCall<'_>) -> ExternalValue;
}

/// Enriches an externalized mapping after the base mapping is built.
///
/// Decorators run in no particular order. Each one must tolerate any other
/// decorator having run before it.
pub trait Decorator: Send + Sync {
    fn decorate(
        &self,
        context: &dyn Externalizable,
        result: &mut ExternalMap,
        call: &mut ExternalizeCall<'_>,
    );
}

/// Lookup of adapters and decorators.
pub trait ComponentRegistry: Send + Sync {
    /// The adapter registered for `capability` under `name`.
    fn lookup_adapter(&self, capability: &Capability, name: &str) -> Option<Arc<dyn Adapter>>;

    /// Every decorator subscribed to `capability`, unordered.
    fn lookup_decorators(&self, capability: &Capability) -> Vec<Arc<dyn Decorator>>;
}

/// In-process component registry.
#[derive(Default)]
pub struct Registry {
    adapters: HashMap<(Capability, String), Arc<dyn Adapter>>,
    decorators: Vec<(Capability, Arc<dyn Decorator>)>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the stock decorators: links on linked objects and
    /// derived mime types on everything.
    pub fn standard(config: &ExternalizationConfig) -> Self {
        let mut registry = Self::new();
        registry.subscribe(Capability::LINKED, Arc::new(LinkDecorator));
        registry.subscribe(
            Capability::ANY,
            Arc::new(MimeTypeDecorator::new(&config.mime_prefix)),
        );
        registry
    }

    /// Register `adapter` for `capability` under `name`, replacing any
    /// previous registration.
    pub fn register_adapter(
        &mut self,
        capability: Capability,
        name: impl Into<String>,
        adapter: Arc<dyn Adapter>,
    ) {
        self.adapters.insert((capability, name.into()), adapter);
    }

    /// Subscribe `decorator` to objects providing `capability`.
    pub fn subscribe(&mut self, capability: Capability, decorator: Arc<dyn Decorator>) {
        self.decorators.push((capability, decorator));
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    pub fn decorator_count(&self) -> usize {
        self.decorators.len()
    }
}

impl ComponentRegistry for Registry {
    fn lookup_adapter(&self, capability: &Capability, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters
            .get(&(capability.clone(), name.to_string()))
            .cloned()
    }

    fn lookup_decorators(&self, capability: &Capability) -> Vec<Arc<dyn Decorator>> {
        self.decorators
            .iter()
            .filter(|(cap, _)| cap == capability)
            .map(|(_, d)| Arc::clone(d))
            .collect()
    }
}
