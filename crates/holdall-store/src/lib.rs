//! Object-database contract for holdall.
//!
//! The container layer never talks to a concrete storage engine. It sees the
//! traits in this crate:
//!
//! - [`ObjectDatabase`] -- registers objects for persistence and resolves
//!   stored references back to live objects (or reports them unreadable)
//! - [`StateStore`] -- versioned persisted state with optimistic concurrency;
//!   a stale write is handed to a [`ConflictResolver`]
//!
//! Persisted state is an opaque [`StateValue`] tree. Associative containers
//! persist as a single inline ordered-tree bucket, and [`bucket`] holds the
//! engine's own three-way key-level merge for that encoding.
//!
//! # Storage Backends
//!
//! - [`InMemoryDatabase`] -- `HashMap`-based database for tests and embedding
//!
//! # Design Rules
//!
//! 1. References are resolved lazily; a dead reference resolves to `None`.
//! 2. Unreadable data is a distinguishable error, never a panic.
//! 3. Writes against a stale serial are conflicts, never silent overwrites.
//! 4. The database never interprets state beyond the bucket encoding.

pub mod bucket;
pub mod error;
pub mod memory;
pub mod persistent;
pub mod state;
pub mod traits;

pub use bucket::resolve_bucket_conflict;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDatabase;
pub use persistent::{PersistenceCell, Persistent};
pub use state::StateValue;
pub use traits::{ConflictResolver, Database, ObjectDatabase, Serial, StateStore};
