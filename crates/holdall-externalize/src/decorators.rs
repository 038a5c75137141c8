use std::sync::Arc;

use holdall_types::fields::{ACL, CLASS, MIMETYPE};
use serde::{Deserialize, Serialize};

use crate::call::ExternalizeCall;
use crate::object::Externalizable;
use crate::registry::Decorator;
use crate::value::{ExternalList, ExternalMap, ExternalValue};

// ---------------------------------------------------------------------------
// MimeTypeDecorator
// ---------------------------------------------------------------------------

/// Derives `MimeType` from `Class` when a mapping has the tag but no mime
/// type.
#[derive(Clone, Debug)]
pub struct MimeTypeDecorator {
    prefix: String,
}

impl MimeTypeDecorator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Decorator for MimeTypeDecorator {
    fn decorate(
        &self,
        _context: &dyn Externalizable,
        result: &mut ExternalMap,
        _call: &mut ExternalizeCall<'_>,
    ) {
        if result.contains_key(MIMETYPE) {
            return;
        }
        let mime_type = match result.get(CLASS).and_then(ExternalValue::as_str) {
            Some(class_name) => format!("{}{}", self.prefix, class_name.to_lowercase()),
            None => return,
        };
        result.insert(MIMETYPE, mime_type);
    }
}

// ---------------------------------------------------------------------------
// ACL
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AceAction {
    Allow,
    Deny,
}

/// One access-control entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    pub action: AceAction,
    pub principal: String,
    pub permission: String,
}

impl Ace {
    pub fn allow(principal: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            action: AceAction::Allow,
            principal: principal.into(),
            permission: permission.into(),
        }
    }

    pub fn deny(principal: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            action: AceAction::Deny,
            principal: principal.into(),
            permission: permission.into(),
        }
    }

    pub fn to_external(&self) -> ExternalValue {
        let mut map = ExternalMap::new();
        map.insert(CLASS, "ACE");
        let action = match self.action {
            AceAction::Allow => "Allow",
            AceAction::Deny => "Deny",
        };
        map.insert("Action", action);
        map.insert("Principal", self.principal.as_str());
        map.insert("Permission", self.permission.as_str());
        ExternalValue::Map(map)
    }
}

/// Computes the effective access-control list of an object.
pub trait AclProvider: Send + Sync {
    /// `None` when the provider has nothing to say about `obj`.
    fn acl(&self, obj: &dyn Externalizable) -> Option<Vec<Ace>>;
}

/// Attaches the effective ACL under the `ACL` field.
pub struct AclDecorator {
    provider: Arc<dyn AclProvider>,
}

impl AclDecorator {
    pub fn new(provider: Arc<dyn AclProvider>) -> Self {
        Self { provider }
    }
}

impl Decorator for AclDecorator {
    fn decorate(
        &self,
        context: &dyn Externalizable,
        result: &mut ExternalMap,
        _call: &mut ExternalizeCall<'_>,
    ) {
        if let Some(acl) = self.provider.acl(context) {
            let list: ExternalList = acl.iter().map(Ace::to_external).collect();
            result.insert(ACL, list);
        }
    }
}
