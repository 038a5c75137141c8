use holdall_externalize::{
    Broken, ExternalList, ExternalMap, ExternalValue, Externalizable, ExternalizeCall,
    StandardAttributes,
};

use crate::container::{ContainedDatabase, Container, Slot, Slots};
use crate::store::ContainerStore;

/// Key under which containers and stores list their entries.
pub const ITEMS: &str = "Items";

/// A container seen through the database that resolves its entries.
pub struct ContainerView<'a> {
    pub container_id: &'a str,
    pub container: &'a Container,
    pub db: &'a ContainedDatabase,
}

impl Externalizable for ContainerView<'_> {
    fn class_name(&self) -> Option<String> {
        Some("Container".into())
    }

    fn standard(&self) -> StandardAttributes {
        StandardAttributes {
            id: Some(self.container_id.to_string()),
            oid: self.container.oid(),
            last_modified: Some(self.container.last_modified()),
            ..Default::default()
        }
    }

    fn to_external_object(&self, call: &mut ExternalizeCall<'_>) -> Option<ExternalValue> {
        let mut result = call.to_external_dictionary(self, None);
        let items = match self.container.slots() {
            Slots::Associative(map) => {
                let mut items = ExternalMap::new();
                for (key, slot) in map.iter() {
                    items.insert(key, externalize_slot(slot, self.db, call));
                }
                ExternalValue::Map(items)
            }
            Slots::Sequential(slots) => ExternalValue::List(
                slots
                    .iter()
                    .flatten()
                    .map(|slot| externalize_slot(slot, self.db, call))
                    .collect::<ExternalList>(),
            ),
        };
        result.insert(ITEMS, items);
        Some(ExternalValue::Map(result))
    }
}

/// Render one entry. Unreadable entries become the broken sentinel; dead
/// references render as null.
fn externalize_slot(slot: &Slot, db: &ContainedDatabase, call: &mut ExternalizeCall<'_>) -> ExternalValue {
    match slot.resolve(db) {
        Ok(Some(obj)) => call.externalize(&*obj),
        Ok(None) => ExternalValue::Null,
        Err(_) => call.externalize(&Broken { oid: slot.oid() }),
    }
}

impl Externalizable for ContainerStore {
    fn class_name(&self) -> Option<String> {
        Some("ContainerStore".into())
    }

    fn standard(&self) -> StandardAttributes {
        StandardAttributes {
            oid: self.oid(),
            last_modified: Some(self.last_modified()),
            ..Default::default()
        }
    }

    fn to_external_object(&self, call: &mut ExternalizeCall<'_>) -> Option<ExternalValue> {
        let mut result = call.to_external_dictionary(self, None);
        let mut containers = ExternalMap::new();
        for (container_id, container) in self.containers() {
            let view = ContainerView {
                container_id,
                container,
                db: self.database().as_ref(),
            };
            containers.insert(container_id, call.externalize(&view));
        }
        result.insert(ITEMS, containers);
        Some(ExternalValue::Map(result))
    }
}
