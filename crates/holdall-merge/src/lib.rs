//! Conflict resolution for holdall.
//!
//! Invoked by the storage engine when two transactions committed divergent
//! versions of the same persisted structure. Timestamps merge by taking the
//! maximum; everything else in a container is handed to the ordered-tree
//! bucket resolver, and a conflict there is fatal.

pub mod container;
pub mod error;
pub mod modtime;

pub use container::{
    find_last_modified, max_last_modified, resolve_container_state, set_last_modified,
    LastModifiedResolver,
};
pub use error::{MergeError, MergeResult};
pub use modtime::{resolve_modtime, resolve_with_max_modtime, ModTracked};
