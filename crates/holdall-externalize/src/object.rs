use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use holdall_types::{Oid, Timestamp};

use crate::call::ExternalizeCall;
use crate::links::Link;
use crate::value::ExternalValue;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A named interface an object provides. Adapters and decorators are
/// registered against capabilities.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    /// Provided by every object. Registrations against it apply to anything.
    pub const ANY: Capability = Capability::from_static("object");
    /// Objects that carry relationship links.
    pub const LINKED: Capability = Capability::from_static("linked");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.0)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// StandardAttributes
// ---------------------------------------------------------------------------

/// The attributes an object exposes for synthetic-field injection. Each
/// present attribute becomes the corresponding well-known field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StandardAttributes {
    pub id: Option<String>,
    pub oid: Option<Oid>,
    pub ntiid: Option<String>,
    pub container_id: Option<String>,
    pub creator: Option<String>,
    pub last_modified: Option<Timestamp>,
    pub created_time: Option<Timestamp>,
    pub mime_type: Option<String>,
}

// ---------------------------------------------------------------------------
// ExternalForm
// ---------------------------------------------------------------------------

/// The shape an object presents to the generic externalization strategies.
pub enum ExternalForm<'a> {
    /// Passes through unchanged.
    Scalar(ExternalValue),
    /// "No value".
    Null,
    /// Key/value pairs, externalized recursively on top of the synthetic
    /// fields.
    Mapping(Vec<(String, Member<'a>)>),
    /// Elements, externalized recursively into a located list.
    Sequence(Vec<Member<'a>>),
    /// No generic strategy applies.
    Opaque,
}

/// A member of a mapping or sequence.
pub enum Member<'a> {
    Value(ExternalValue),
    Ref(&'a dyn Externalizable),
    Shared(Arc<dyn Externalizable>),
}

impl<'a> Member<'a> {
    pub fn value(v: impl Into<ExternalValue>) -> Self {
        Member::Value(v.into())
    }
}

// ---------------------------------------------------------------------------
// Externalizable
// ---------------------------------------------------------------------------

/// An object the externalizer can walk.
///
/// Every method has a default, so an implementation only describes what
/// the object actually has.
pub trait Externalizable: Send + Sync {
    /// Capabilities this object provides, most specific first.
    /// [`Capability::ANY`] is implied.
    fn provides(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Value of the `Class` type tag. `None` for bare untyped data.
    fn class_name(&self) -> Option<String> {
        None
    }

    /// Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn standard(&self) -> StandardAttributes {
        StandardAttributes::default()
    }

    fn external_form(&self) -> ExternalForm<'_> {
        ExternalForm::Opaque
    }

    /// Self-rendering hook. Returning `Some` bypasses the generic
    /// strategies; decorators still run on a mapping result.
    fn to_external_object(&self, _call: &mut ExternalizeCall<'_>) -> Option<ExternalValue> {
        None
    }

    /// Declared relationship links.
    fn links(&self) -> Vec<Link> {
        Vec::new()
    }

    /// Names of enclosed items, each reported as an `enclosure` link.
    fn enclosures(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the backing storage of this object could not be read.
    fn is_broken(&self) -> bool {
        false
    }

    /// Already-plain data that externalizes to itself.
    fn as_plain(&self) -> Option<ExternalValue> {
        None
    }

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

/// Stand-in for a persisted reference whose target could not be read.
#[derive(Clone, Copy, Debug, Default)]
pub struct Broken {
    pub oid: Option<Oid>,
}

impl Externalizable for Broken {
    fn is_broken(&self) -> bool {
        true
    }

    fn standard(&self) -> StandardAttributes {
        StandardAttributes {
            oid: self.oid,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Plain data
// ---------------------------------------------------------------------------

impl Externalizable for ExternalValue {
    fn as_plain(&self) -> Option<ExternalValue> {
        Some(self.clone())
    }
}

impl Externalizable for String {
    fn as_plain(&self) -> Option<ExternalValue> {
        Some(ExternalValue::String(self.clone()))
    }
}

impl Externalizable for bool {
    fn as_plain(&self) -> Option<ExternalValue> {
        Some(ExternalValue::Bool(*self))
    }
}

impl Externalizable for i64 {
    fn as_plain(&self) -> Option<ExternalValue> {
        Some(ExternalValue::Int(*self))
    }
}

impl Externalizable for f64 {
    fn as_plain(&self) -> Option<ExternalValue> {
        Some(ExternalValue::Float(*self))
    }
}

impl<T: Externalizable> Externalizable for Option<T> {
    fn external_form(&self) -> ExternalForm<'_> {
        match self {
            Some(inner) => inner.external_form(),
            None => ExternalForm::Null,
        }
    }

    fn as_plain(&self) -> Option<ExternalValue> {
        match self {
            Some(inner) => inner.as_plain(),
            None => Some(ExternalValue::Null),
        }
    }
}

impl<T: Externalizable> Externalizable for Vec<T> {
    fn external_form(&self) -> ExternalForm<'_> {
        ExternalForm::Sequence(self.iter().map(|item| Member::Ref(item)).collect())
    }
}

impl<T: Externalizable> Externalizable for BTreeMap<String, T> {
    fn external_form(&self) -> ExternalForm<'_> {
        ExternalForm::Mapping(
            self.iter()
                .map(|(k, v)| (k.clone(), Member::Ref(v)))
                .collect(),
        )
    }
}
