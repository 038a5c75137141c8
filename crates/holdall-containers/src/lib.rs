//! Contained-object storage for holdall.
//!
//! A [`ContainerStore`] groups contained objects into named containers:
//!
//! - [`Container`] -- associative (keyed by id, merged at commit) or
//!   sequential (positional, append-only with holes)
//! - [`Contained`] -- the contract every stored object meets, with its
//!   bookkeeping in [`ContainedMeta`]
//! - [`ContainedRecord`] -- a ready-made contained object with free-form
//!   fields
//!
//! Stores either own their objects or, when configured weak, hold
//! references to objects owned by another store in the same database.
//! Lookups skip dangling references, and sequential containers compact them
//! away on delete. [`ContainerStore::clean_broken`] removes unreadable entries
//! from associative containers.
//!
//! Every mutation advances the container's and the store's modification
//! time; the store's time never trails any of its containers.

pub mod config;
pub mod contained;
pub mod container;
pub mod error;
pub mod extensions;
pub mod external;
pub mod keys;
pub mod store;
pub mod tracked;

pub use config::{ContainerKind, CreatorPolicy, LogLevel, StoreConfig};
pub use contained::{same_object, Contained, ContainedMeta, ContainedRecord, CONTAINED};
pub use container::{
    ContainedDatabase, Container, Ownership, Removal, Slot, Slots, TypeConstraint,
};
pub use error::{ContainedObjectValueError, ContainerError, ContainerResult};
pub use extensions::{Factory, Hook, RuntimeExtensions};
pub use external::{ContainerView, ITEMS};
pub use keys::{KeyPolicy, KeyedMap};
pub use store::{ContainerStore, StoreState};
pub use tracked::ModTrackedList;
