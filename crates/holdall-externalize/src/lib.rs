//! Externalization for holdall.
//!
//! Walks arbitrary object graphs and produces plain nested data
//! ([`ExternalValue`]) ready for JSON or plist encoding.
//!
//! # Resolution order
//!
//! For each object:
//!
//! 1. Plain data passes through unchanged.
//! 2. Broken objects render as [`BROKEN_OBJECT`].
//! 3. An object already being walked renders as its identifier.
//! 4. An adapter registered for one of the object's capabilities under the
//!    active name (falling back to the default name) renders it.
//! 5. Otherwise the object renders itself, or presents an [`ExternalForm`]
//!    that the generic strategies walk.
//! 6. Decorators subscribed to the object's capabilities enrich a mapping
//!    result.
//!
//! The active adapter name lives on the [`ExternalizeCall`] threaded through
//! the walk, scoped with [`ExternalizeCall::scoped_name`].

pub mod call;
pub mod config;
pub mod decorators;
pub mod encode;
pub mod error;
pub mod externalizer;
pub mod ids;
pub mod links;
pub mod object;
pub mod registry;
pub mod value;

pub use call::{ExternalizeCall, NameScope, BROKEN_OBJECT, RECURSIVE_REFERENCE};
pub use config::ExternalizationConfig;
pub use decorators::{Ace, AceAction, AclDecorator, AclProvider, MimeTypeDecorator};
pub use encode::{Encoder, JsonEncoder};
pub use error::{ExternalizeError, ExternalizeResult};
pub use externalizer::Externalizer;
pub use ids::{ExternalIdGenerator, NtiidGenerator};
pub use links::{find_links, Link, LinkDecorator, ENCLOSURE};
pub use object::{Broken, Capability, ExternalForm, Externalizable, Member, StandardAttributes};
pub use registry::{Adapter, ComponentRegistry, Decorator, Registry};
pub use value::{
    strip_none, strip_synthetic_keys, ExternalList, ExternalMap, ExternalValue, Location,
    OpaqueValue,
};
