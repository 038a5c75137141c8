//! Externalizing stored objects through registries, adapters and
//! decorators.

use std::sync::Arc;

use holdall_containers::{Contained, ContainedRecord, ContainerStore, StoreConfig, CONTAINED};
use holdall_externalize::{
    Ace, AclDecorator, AclProvider, Adapter, Capability, Decorator, ExternalMap, ExternalValue,
    Externalizable, ExternalizationConfig, ExternalizeCall, Externalizer, JsonEncoder, Registry,
};

struct OwnerOnly;

impl AclProvider for OwnerOnly {
    fn acl(&self, obj: &dyn Externalizable) -> Option<Vec<Ace>> {
        let creator = obj.standard().creator?;
        Some(vec![Ace::allow(creator, "all")])
    }
}

/// Marks the mapping it decorates.
struct Stamp;

impl Decorator for Stamp {
    fn decorate(
        &self,
        _context: &dyn Externalizable,
        result: &mut ExternalMap,
        _call: &mut ExternalizeCall<'_>,
    ) {
        result.insert("stamped", true);
    }
}

struct Summary;

impl Adapter for Summary {
    fn adapt(&self, obj: &dyn Externalizable, call: &mut ExternalizeCall<'_>) -> ExternalValue {
        let mut map = call.to_external_dictionary(obj, None);
        map.insert("summary", call.active_name());
        ExternalValue::Map(map)
    }
}

fn externalizer(build: impl FnOnce(&mut Registry)) -> Externalizer {
    let config = ExternalizationConfig::default();
    let mut registry = Registry::standard(&config);
    build(&mut registry);
    Externalizer::new(Arc::new(registry), config)
}

fn stored_note() -> (ContainerStore, Arc<dyn Contained>) {
    let mut store = ContainerStore::new(
        StoreConfig::default()
            .with_creator(holdall_containers::CreatorPolicy::Principal("alice".into())),
    );
    let note: Arc<dyn Contained> = Arc::new(
        ContainedRecord::new("Note", "notes")
            .with_id("n1")
            .with_field("body", "hello"),
    );
    let note = store.add_contained_object(note).unwrap();
    (store, note)
}

#[test]
fn decorator_registration_order_does_not_matter() {
    let (_store, note) = stored_note();
    let forward = externalizer(|r| {
        r.subscribe(CONTAINED, Arc::new(AclDecorator::new(Arc::new(OwnerOnly))));
        r.subscribe(CONTAINED, Arc::new(Stamp));
    });
    let backward = externalizer(|r| {
        r.subscribe(CONTAINED, Arc::new(Stamp));
        r.subscribe(CONTAINED, Arc::new(AclDecorator::new(Arc::new(OwnerOnly))));
    });

    let a = forward.externalize(&*note);
    let b = backward.externalize(&*note);
    assert_eq!(a, b);

    let map = a.as_map().unwrap();
    assert_eq!(map.get("stamped"), Some(&ExternalValue::Bool(true)));
    assert_eq!(map.get("Creator").and_then(ExternalValue::as_str), Some("alice"));
    assert_eq!(
        map.get("MimeType").and_then(ExternalValue::as_str),
        Some("application/vnd.holdall.note")
    );
    assert_eq!(map.get("ACL").and_then(ExternalValue::as_list).unwrap().len(), 1);
}

#[test]
fn named_adapter_applies_to_stored_objects() {
    let (store, note) = stored_note();
    let ext = externalizer(|r| {
        r.register_adapter(Capability::new("note"), "summary", Arc::new(Summary));
    });

    let summary = ext.externalize_with_name(&*note, "summary");
    assert_eq!(
        summary.as_map().unwrap().get("summary").and_then(ExternalValue::as_str),
        Some("summary")
    );
    assert!(summary.as_map().unwrap().get("body").is_none());

    let whole = ext.externalize_with_name(&store, "summary");
    let rendered = whole
        .as_map()
        .unwrap()
        .get("Items")
        .unwrap()
        .as_map()
        .unwrap()
        .get("notes")
        .unwrap()
        .as_map()
        .unwrap()
        .get("Items")
        .unwrap()
        .as_map()
        .unwrap()
        .get("n1")
        .unwrap()
        .clone();
    assert_eq!(rendered, summary);
}

#[test]
fn stored_objects_encode_as_json() {
    let (store, _note) = stored_note();
    let ext = Externalizer::default();
    let json = ext
        .to_external_representation(&store, &JsonEncoder::compact(), "")
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["Class"], "ContainerStore");
    assert_eq!(parsed["Items"]["notes"]["Items"]["n1"]["body"], "hello");
}
