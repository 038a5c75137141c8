use std::sync::Arc;

use tracing::error;

use crate::call::ExternalizeCall;
use crate::config::ExternalizationConfig;
use crate::encode::{Encoder, JsonEncoder};
use crate::error::ExternalizeResult;
use crate::ids::{ExternalIdGenerator, NtiidGenerator};
use crate::object::Externalizable;
use crate::registry::{ComponentRegistry, Registry};
use crate::value::{strip_none, ExternalMap, ExternalValue};

/// Turns object graphs into plain data.
///
/// The externalizer itself is immutable and can be shared between threads;
/// every externalization runs in its own [`ExternalizeCall`].
pub struct Externalizer {
    registry: Arc<dyn ComponentRegistry>,
    ids: Arc<dyn ExternalIdGenerator>,
    config: ExternalizationConfig,
}

impl Externalizer {
    pub fn new(registry: Arc<dyn ComponentRegistry>, config: ExternalizationConfig) -> Self {
        Self {
            registry,
            ids: Arc::new(NtiidGenerator::from_config(&config)),
            config,
        }
    }

    /// An externalizer over [`Registry::standard`].
    pub fn standard(config: ExternalizationConfig) -> Self {
        Self::new(Arc::new(Registry::standard(&config)), config)
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn ExternalIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn registry(&self) -> &dyn ComponentRegistry {
        self.registry.as_ref()
    }

    pub fn ids(&self) -> &dyn ExternalIdGenerator {
        self.ids.as_ref()
    }

    pub fn config(&self) -> &ExternalizationConfig {
        &self.config
    }

    /// Start a call with `name` as the active adapter name.
    pub fn call(&self, name: &str) -> ExternalizeCall<'_> {
        ExternalizeCall::new(self, name)
    }

    /// Externalize under the default adapter name.
    pub fn externalize(&self, obj: &dyn Externalizable) -> ExternalValue {
        self.call("").externalize(obj)
    }

    pub fn externalize_with_name(&self, obj: &dyn Externalizable, name: &str) -> ExternalValue {
        self.call(name).externalize(obj)
    }

    /// The standard mapping of `obj` without decorators. See
    /// [`ExternalizeCall::to_external_dictionary`].
    pub fn to_external_dictionary(
        &self,
        obj: &dyn Externalizable,
        merge_from: Option<ExternalMap>,
    ) -> ExternalMap {
        self.call("").to_external_dictionary(obj, merge_from)
    }

    /// Externalize and encode in one step.
    ///
    /// Encoding failures are logged with the object's type and the adapter
    /// name before being returned.
    pub fn to_external_representation(
        &self,
        obj: &dyn Externalizable,
        encoder: &dyn Encoder,
        name: &str,
    ) -> ExternalizeResult<String> {
        let mut value = self.externalize_with_name(obj, name);
        if encoder.strips_none() {
            strip_none(&mut value);
        }
        encoder.encode(&value).inspect_err(|err| {
            error!(
                type_name = obj.type_name(),
                name,
                format = encoder.format_name(),
                %err,
                "failed to encode external representation"
            );
        })
    }

    pub fn to_json(&self, obj: &dyn Externalizable) -> ExternalizeResult<String> {
        self.to_external_representation(obj, &JsonEncoder::compact(), "")
    }
}

impl Default for Externalizer {
    fn default() -> Self {
        Self::standard(ExternalizationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use holdall_types::fields::{ACL, CLASS, ID, LAST_MODIFIED, LINKS, MIMETYPE, NTIID, OID};
    use holdall_types::Oid;
    use proptest::prelude::*;

    use super::*;
    use crate::call::{BROKEN_OBJECT, RECURSIVE_REFERENCE};
    use crate::decorators::{Ace, AclDecorator, AclProvider};
    use crate::error::ExternalizeError;
    use crate::links::{Link, LinkDecorator};
    use crate::object::{Broken, Capability, ExternalForm, Member, StandardAttributes};
    use crate::registry::{Adapter, Decorator};
    use crate::value::ExternalList;

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    struct Note {
        oid: Option<Oid>,
        id: String,
        title: String,
        body: Option<String>,
        modified: f64,
        links: Vec<Link>,
        enclosures: Vec<String>,
    }

    impl Note {
        fn new(id: &str, title: &str) -> Self {
            Self {
                oid: None,
                id: id.into(),
                title: title.into(),
                body: None,
                modified: 100.0,
                links: Vec::new(),
                enclosures: Vec::new(),
            }
        }
    }

    impl Externalizable for Note {
        fn provides(&self) -> Vec<Capability> {
            vec![Capability::new("note"), Capability::LINKED]
        }

        fn class_name(&self) -> Option<String> {
            Some("Note".into())
        }

        fn standard(&self) -> StandardAttributes {
            StandardAttributes {
                id: Some(self.id.clone()),
                oid: self.oid,
                container_id: Some("notes".into()),
                creator: Some("alice".into()),
                last_modified: Some(self.modified),
                created_time: Some(50.0),
                ..Default::default()
            }
        }

        fn external_form(&self) -> ExternalForm<'_> {
            ExternalForm::Mapping(vec![
                ("title".into(), Member::value(self.title.as_str())),
                ("body".into(), Member::Ref(&self.body)),
            ])
        }

        fn links(&self) -> Vec<Link> {
            self.links.clone()
        }

        fn enclosures(&self) -> Vec<String> {
            self.enclosures.clone()
        }
    }

    struct Widget;

    impl Externalizable for Widget {}

    struct Loop {
        label: String,
    }

    impl Externalizable for Loop {
        fn class_name(&self) -> Option<String> {
            Some(self.label.clone())
        }

        fn external_form(&self) -> ExternalForm<'_> {
            ExternalForm::Mapping(vec![("me".into(), Member::Ref(self))])
        }
    }

    struct Parent {
        child: Note,
    }

    impl Externalizable for Parent {
        fn provides(&self) -> Vec<Capability> {
            vec![Capability::new("parent")]
        }

        fn external_form(&self) -> ExternalForm<'_> {
            ExternalForm::Mapping(vec![("child".into(), Member::Ref(&self.child))])
        }
    }

    /// Renders the standard dictionary plus the adapter's tag and the name
    /// active while it ran.
    struct Tagging(&'static str);

    impl Adapter for Tagging {
        fn adapt(&self, obj: &dyn Externalizable, call: &mut ExternalizeCall<'_>) -> ExternalValue {
            let mut map = call.to_external_dictionary(obj, None);
            map.insert("adapter", self.0);
            map.insert("active", call.active_name());
            ExternalValue::Map(map)
        }
    }

    #[derive(Default)]
    struct NameRecorder {
        seen: Mutex<Vec<String>>,
    }

    impl Adapter for NameRecorder {
        fn adapt(&self, _obj: &dyn Externalizable, call: &mut ExternalizeCall<'_>) -> ExternalValue {
            self.seen
                .lock()
                .unwrap()
                .push(call.active_name().to_string());
            ExternalValue::from("recorded")
        }
    }

    fn registry_with(build: impl FnOnce(&mut Registry)) -> Externalizer {
        let mut registry = Registry::new();
        build(&mut registry);
        Externalizer::new(Arc::new(registry), ExternalizationConfig::default())
    }

    fn keys(value: &ExternalValue) -> Vec<String> {
        value.as_map().unwrap().keys().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Plain data
    // -----------------------------------------------------------------------

    #[test]
    fn scalars_pass_through() {
        let ext = Externalizer::default();
        assert_eq!(ext.externalize(&"text".to_string()), ExternalValue::from("text"));
        assert_eq!(ext.externalize(&42i64), ExternalValue::Int(42));
        assert_eq!(ext.externalize(&true), ExternalValue::Bool(true));
        assert_eq!(ext.externalize(&None::<String>), ExternalValue::Null);
    }

    #[test]
    fn coerce_none_renders_false() {
        let config = ExternalizationConfig {
            coerce_none: true,
            ..Default::default()
        };
        let ext = Externalizer::standard(config);
        assert_eq!(ext.externalize(&None::<String>), ExternalValue::Bool(false));
    }

    #[test]
    fn bare_mapping_has_no_class() {
        let ext = Externalizer::default();
        let mut data = std::collections::BTreeMap::new();
        data.insert("a".to_string(), 1i64);
        let value = ext.externalize(&data);
        assert_eq!(keys(&value), vec!["a"]);
    }

    #[test]
    fn sequences_are_located_lists() {
        let ext = Externalizer::default();
        let value = ext.externalize_with_name(&vec!["x".to_string(), "y".to_string()], "summary");
        let list = value.as_list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.location().unwrap().name, "summary");
    }

    // -----------------------------------------------------------------------
    // Synthetic fields
    // -----------------------------------------------------------------------

    #[test]
    fn mapping_gets_exactly_the_implied_synthetic_fields() {
        let ext = Externalizer::default();
        let value = ext.externalize(&Note::new("n1", "Hello"));
        assert_eq!(
            keys(&value),
            vec![
                "Class",
                "ContainerId",
                "CreatedTime",
                "Creator",
                "ID",
                "Last Modified",
                "MimeType",
                "body",
                "title"
            ]
        );
        let map = value.as_map().unwrap();
        assert_eq!(map.get(CLASS), Some(&ExternalValue::from("Note")));
        assert_eq!(
            map.get(MIMETYPE),
            Some(&ExternalValue::from("application/vnd.holdall.note"))
        );
        assert_eq!(map.get("body"), Some(&ExternalValue::Null));
    }

    #[test]
    fn persisted_identity_adds_oid_and_ntiid() {
        let ext = Externalizer::default();
        let mut note = Note::new("n1", "Hello");
        note.oid = Some(Oid::new(5));
        let value = ext.externalize(&note);
        let map = value.as_map().unwrap();
        assert_eq!(map.get(OID), Some(&ExternalValue::from("0x0000000000000005")));
        assert_eq!(
            map.get(NTIID),
            Some(&ExternalValue::from(
                "tag:holdall.dev,2011-10:alice-OID-0x0000000000000005"
            ))
        );
    }

    #[test]
    fn reexternalizing_plain_result_is_identity() {
        let ext = Externalizer::default();
        let value = ext.externalize(&Note::new("n1", "Hello"));
        assert_eq!(ext.externalize(&value), value);
    }

    #[test]
    fn seed_values_win_except_timestamps_and_class() {
        let ext = Externalizer::default();
        let mut seed = ExternalMap::new();
        seed.insert(ID, "seeded");
        seed.insert(LAST_MODIFIED, 1.0);
        seed.insert(CLASS, "Other");
        seed.insert("extra", 1i64);
        let map = ext.to_external_dictionary(&Note::new("n1", "Hello"), Some(seed));
        assert_eq!(map.get(ID), Some(&ExternalValue::from("seeded")));
        assert_eq!(map.get(LAST_MODIFIED), Some(&ExternalValue::Float(100.0)));
        assert_eq!(map.get(CLASS), Some(&ExternalValue::from("Note")));
        assert_eq!(map.get("extra"), Some(&ExternalValue::Int(1)));
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    #[test]
    fn broken_object_renders_sentinel() {
        let ext = Externalizer::default();
        assert_eq!(
            ext.externalize(&Broken::default()),
            ExternalValue::from(BROKEN_OBJECT)
        );
    }

    #[test]
    fn self_reference_renders_sentinel() {
        let ext = Externalizer::default();
        let value = ext.externalize(&Loop {
            label: "Loop".into(),
        });
        assert_eq!(
            value.as_map().unwrap().get("me"),
            Some(&ExternalValue::from(RECURSIVE_REFERENCE))
        );
    }

    #[test]
    fn depth_limit_cuts_nesting() {
        let config = ExternalizationConfig {
            max_depth: 2,
            ..Default::default()
        };
        let ext = Externalizer::standard(config);
        let nested = vec![vec![vec!["deep".to_string()]]];
        let value = ext.externalize(&nested);
        let inner = value.as_list().unwrap().items()[0].as_list().unwrap();
        assert_eq!(inner.items()[0], ExternalValue::from(RECURSIVE_REFERENCE));
    }

    #[test]
    fn unknown_objects_leak_as_opaque() {
        let ext = Externalizer::default();
        let value = ext.externalize(&Widget);
        assert!(matches!(value, ExternalValue::Opaque(_)));
        match ext.to_json(&Widget) {
            Err(ExternalizeError::Opaque { type_name }) => assert!(type_name.contains("Widget")),
            other => panic!("expected opaque error, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Adapters and name scoping
    // -----------------------------------------------------------------------

    #[test]
    fn named_adapter_with_default_fallback() {
        let ext = registry_with(|r| {
            r.register_adapter(Capability::new("note"), "summary", Arc::new(Tagging("summary")));
            r.register_adapter(Capability::new("note"), "", Arc::new(Tagging("default")));
        });
        let note = Note::new("n1", "Hello");

        let summary = ext.externalize_with_name(&note, "summary");
        assert_eq!(
            summary.as_map().unwrap().get("adapter"),
            Some(&ExternalValue::from("summary"))
        );

        let fallback = ext.externalize_with_name(&note, "missing");
        let map = fallback.as_map().unwrap();
        assert_eq!(map.get("adapter"), Some(&ExternalValue::from("default")));
        assert_eq!(map.get("active"), Some(&ExternalValue::from("missing")));
    }

    #[test]
    fn fallback_can_be_disabled() {
        let mut registry = Registry::new();
        registry.register_adapter(Capability::new("note"), "", Arc::new(Tagging("default")));
        let config = ExternalizationConfig {
            fallback_to_default_name: false,
            ..Default::default()
        };
        let ext = Externalizer::new(Arc::new(registry), config);
        let value = ext.externalize_with_name(&Note::new("n1", "Hello"), "missing");
        assert!(!value.as_map().unwrap().contains_key("adapter"));
    }

    #[test]
    fn adapters_match_the_universal_capability() {
        let ext = registry_with(|r| {
            r.register_adapter(Capability::ANY, "", Arc::new(Tagging("any")));
        });
        let value = ext.externalize(&Widget);
        assert_eq!(
            value.as_map().unwrap().get("adapter"),
            Some(&ExternalValue::from("any"))
        );
    }

    #[test]
    fn nested_calls_inherit_the_active_name() {
        let recorder = Arc::new(NameRecorder::default());
        let ext = registry_with(|r| {
            r.register_adapter(Capability::new("note"), "", recorder.clone());
        });
        let parent = Parent {
            child: Note::new("n1", "Hello"),
        };
        ext.externalize_with_name(&parent, "x");
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["x"]);
    }

    #[test]
    fn scoped_name_is_restored_after_nested_call() {
        struct Rename {
            child: Note,
            after: Mutex<Option<String>>,
        }

        impl Decorator for Rename {
            fn decorate(
                &self,
                _context: &dyn Externalizable,
                result: &mut ExternalMap,
                call: &mut ExternalizeCall<'_>,
            ) {
                let nested = call.externalize_with_name(&self.child, "y");
                result.insert("nested", nested);
                *self.after.lock().unwrap() = Some(call.active_name().to_string());
            }
        }

        let recorder = Arc::new(NameRecorder::default());
        let rename = Arc::new(Rename {
            child: Note::new("n2", "Child"),
            after: Mutex::new(None),
        });
        let ext = registry_with(|r| {
            r.register_adapter(Capability::new("note"), "", recorder.clone());
            r.subscribe(Capability::new("parent"), rename.clone());
        });

        let parent = Parent {
            child: Note::new("n1", "Hello"),
        };
        ext.externalize_with_name(&parent, "x");

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["x", "y"]);
        assert_eq!(rename.after.lock().unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn name_scope_pops_on_drop() {
        let ext = Externalizer::default();
        let mut call = ext.call("outer");
        {
            let scope = call.scoped_name("inner");
            assert_eq!(scope.active_name(), "inner");
        }
        assert_eq!(call.active_name(), "outer");
    }

    #[test]
    fn concurrent_calls_do_not_share_names() {
        let ext = registry_with(|r| {
            r.register_adapter(Capability::new("note"), "", Arc::new(Tagging("default")));
        });
        let note = Note::new("n1", "Hello");
        std::thread::scope(|s| {
            for name in ["a", "b"] {
                let ext = &ext;
                let note = &note;
                s.spawn(move || {
                    for _ in 0..100 {
                        let value = ext.externalize_with_name(note, name);
                        assert_eq!(
                            value.as_map().unwrap().get("active"),
                            Some(&ExternalValue::from(name))
                        );
                    }
                });
            }
        });
    }

    // -----------------------------------------------------------------------
    // Decorators
    // -----------------------------------------------------------------------

    fn linked_note() -> Note {
        let mut note = Note::new("n1", "Hello");
        note.enclosures = vec!["b.png".into()];
        note.links = vec![Link::new("edit").with_href("/edit")];
        note
    }

    fn rels(value: &ExternalValue) -> Vec<String> {
        let links = value.as_map().unwrap().get(LINKS).unwrap().as_list().unwrap();
        links
            .iter()
            .map(|l| l.as_map().unwrap().get("rel").unwrap().as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn links_are_decorated_sorted() {
        let ext = Externalizer::default();
        let value = ext.externalize(&linked_note());
        let links = value.as_map().unwrap().get(LINKS).unwrap().as_list().unwrap();
        assert!(links.items().windows(2).all(|w| w[0] <= w[1]));
        let mut found = rels(&value);
        found.sort();
        assert_eq!(found, vec!["edit", "enclosure"]);
        assert_eq!(links.location().unwrap().name, LINKS);
    }

    struct ExtraLink;

    impl Decorator for ExtraLink {
        fn decorate(
            &self,
            _context: &dyn Externalizable,
            result: &mut ExternalMap,
            call: &mut ExternalizeCall<'_>,
        ) {
            let extra = call.externalize(&Link::new("extra").with_href("/x"));
            let mut links = match result.remove(LINKS) {
                Some(ExternalValue::List(list)) => list,
                _ => ExternalList::new(),
            };
            if !links.contains(&extra) {
                links.push(extra);
            }
            result.insert(LINKS, links);
        }
    }

    #[test]
    fn link_decorators_are_order_independent() {
        let forward = registry_with(|r| {
            r.subscribe(Capability::LINKED, Arc::new(LinkDecorator));
            r.subscribe(Capability::LINKED, Arc::new(ExtraLink));
        });
        let backward = registry_with(|r| {
            r.subscribe(Capability::LINKED, Arc::new(ExtraLink));
            r.subscribe(Capability::LINKED, Arc::new(LinkDecorator));
        });
        let note = linked_note();

        let mut a = rels(&forward.externalize(&note));
        let mut b = rels(&backward.externalize(&note));
        a.sort();
        b.sort();
        assert_eq!(a, b);
        assert_eq!(a, vec!["edit", "enclosure", "extra"]);
    }

    #[test]
    fn acl_decorator_attaches_entries() {
        struct Everyone;

        impl AclProvider for Everyone {
            fn acl(&self, _obj: &dyn Externalizable) -> Option<Vec<Ace>> {
                Some(vec![Ace::allow("alice", "read"), Ace::deny("everyone", "write")])
            }
        }

        let ext = registry_with(|r| {
            r.subscribe(Capability::ANY, Arc::new(AclDecorator::new(Arc::new(Everyone))));
        });
        let value = ext.externalize(&Note::new("n1", "Hello"));
        let acl = value.as_map().unwrap().get(ACL).unwrap().as_list().unwrap();
        assert_eq!(acl.len(), 2);
        let first = acl.items()[0].as_map().unwrap();
        assert_eq!(first.get("Action"), Some(&ExternalValue::from("Allow")));
        assert_eq!(first.get("Principal"), Some(&ExternalValue::from("alice")));
    }

    #[test]
    fn mime_type_derived_for_self_rendered_objects() {
        struct Custom;

        impl Externalizable for Custom {
            fn to_external_object(&self, _call: &mut ExternalizeCall<'_>) -> Option<ExternalValue> {
                let mut map = ExternalMap::new();
                map.insert(CLASS, "Widget");
                Some(ExternalValue::Map(map))
            }
        }

        let ext = Externalizer::default();
        let value = ext.externalize(&Custom);
        assert_eq!(
            value.as_map().unwrap().get(MIMETYPE),
            Some(&ExternalValue::from("application/vnd.holdall.widget"))
        );
    }

    #[test]
    fn decorator_on_several_capabilities_runs_once() {
        struct Counting(AtomicUsize);

        impl Decorator for Counting {
            fn decorate(
                &self,
                _context: &dyn Externalizable,
                _result: &mut ExternalMap,
                _call: &mut ExternalizeCall<'_>,
            ) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let ext = registry_with(|r| {
            r.subscribe(Capability::new("note"), counting.clone());
            r.subscribe(Capability::ANY, counting.clone());
        });
        ext.externalize(&Note::new("n1", "Hello"));
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    struct StrippingJson;

    impl Encoder for StrippingJson {
        fn format_name(&self) -> &str {
            "plist"
        }

        fn strips_none(&self) -> bool {
            true
        }

        fn encode(&self, value: &ExternalValue) -> ExternalizeResult<String> {
            JsonEncoder::compact().encode(value)
        }
    }

    #[test]
    fn stripping_encoder_drops_nulls() {
        let ext = Externalizer::default();
        let note = Note::new("n1", "Hello");
        let stripped = ext
            .to_external_representation(&note, &StrippingJson, "")
            .unwrap();
        assert!(!stripped.contains("\"body\""));
        let kept = ext.to_json(&note).unwrap();
        assert!(kept.contains("\"body\":null"));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn plain_value() -> impl Strategy<Value = ExternalValue> {
        let leaf = prop_oneof![
            Just(ExternalValue::Null),
            any::<bool>().prop_map(ExternalValue::Bool),
            any::<i64>().prop_map(ExternalValue::Int),
            "[a-z]{0,8}".prop_map(ExternalValue::String),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4)
                    .prop_map(|items| ExternalValue::List(items.into())),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|entries| ExternalValue::Map(entries.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn plain_data_is_a_fixed_point(value in plain_value()) {
            let ext = Externalizer::default();
            prop_assert_eq!(ext.externalize(&value), value);
        }
    }
}
