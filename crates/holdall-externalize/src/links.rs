use holdall_types::fields::{CLASS, LINKS};

use crate::call::ExternalizeCall;
use crate::object::Externalizable;
use crate::registry::Decorator;
use crate::value::{ExternalList, ExternalMap, ExternalValue, Location};

/// Relation of links generated for enclosed items.
pub const ENCLOSURE: &str = "enclosure";

/// A relationship from one object to another resource.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Link {
    pub rel: String,
    pub href: Option<String>,
    /// Portable id of the target object.
    pub target: Option<String>,
    pub mime_type: Option<String>,
    pub title: Option<String>,
}

impl Link {
    pub fn new(rel: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            ..Default::default()
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Externalizable for Link {
    fn class_name(&self) -> Option<String> {
        Some("Link".into())
    }

    fn to_external_object(&self, _call: &mut ExternalizeCall<'_>) -> Option<ExternalValue> {
        let mut map = ExternalMap::new();
        map.insert(CLASS, "Link");
        map.insert("rel", self.rel.as_str());
        if let Some(href) = &self.href {
            map.insert("href", href.as_str());
        }
        if let Some(target) = &self.target {
            map.insert("ntiid", target.as_str());
        }
        if let Some(mime_type) = &self.mime_type {
            map.insert("type", mime_type.as_str());
        }
        if let Some(title) = &self.title {
            map.insert("title", title.as_str());
        }
        Some(ExternalValue::Map(map))
    }
}

/// One `enclosure` link per enclosed item, followed by the object's
/// declared links.
pub fn find_links(obj: &dyn Externalizable) -> Vec<Link> {
    obj.enclosures()
        .into_iter()
        .map(|name| Link::new(ENCLOSURE).with_href(name))
        .chain(obj.links())
        .collect()
}

/// Externalize the links of `obj`, dropping empty results.
pub fn externalize_links(
    call: &mut ExternalizeCall<'_>,
    obj: &dyn Externalizable,
) -> Vec<ExternalValue> {
    find_links(obj)
        .iter()
        .map(|link| call.externalize(link))
        .filter(ExternalValue::is_truthy)
        .collect()
}

/// Merges an object's links into the `Links` field.
///
/// The object's own links come first, sorted; links some other decorator
/// already placed in the field follow, minus duplicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkDecorator;

impl Decorator for LinkDecorator {
    fn decorate(
        &self,
        context: &dyn Externalizable,
        result: &mut ExternalMap,
        call: &mut ExternalizeCall<'_>,
    ) {
        let mut links = externalize_links(call, context);
        links.sort();

        let parent = call.identify(context);
        for link in &mut links {
            if let Some(map) = link.as_map_mut() {
                map.set_location(Location::new(LINKS, parent.clone()));
            }
        }

        let existing = match result.remove(LINKS) {
            Some(ExternalValue::List(list)) => list.into_items(),
            Some(other) => vec![other],
            None => Vec::new(),
        };
        for link in existing {
            if !links.contains(&link) {
                links.push(link);
            }
        }

        if !links.is_empty() {
            let mut list = ExternalList::from(links);
            list.set_location(Location::new(LINKS, parent));
            result.insert(LINKS, list);
        }
    }
}
