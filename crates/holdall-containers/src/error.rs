use std::fmt;

use holdall_store::StoreError;

/// A contained object that failed validation.
///
/// Carries a description of the offending object so the message stays
/// useful after the object itself is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainedObjectValueError {
    pub message: String,
    pub type_name: String,
    pub repr: String,
}

impl fmt::Display for ContainedObjectValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [type: {} repr {}]",
            self.message, self.type_name, self.repr
        )
    }
}

impl std::error::Error for ContainedObjectValueError {}

/// Errors from container and store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContainerError {
    /// The object is not a valid contained object for this store.
    #[error("invalid contained object: {0}")]
    Validation(#[from] ContainedObjectValueError),

    /// The id is held by a different, live entry.
    #[error("contained object uses existing id {id} in container {container_id}")]
    IdInUse { container_id: String, id: String },

    #[error("container {0} already exists")]
    ContainerExists(String),

    #[error("no such container: {0}")]
    NoSuchContainer(String),

    /// The container only accepts items providing a particular capability.
    #[error("item {id} for container {container} must provide {expected}")]
    InvalidItemType {
        container: String,
        expected: String,
        id: String,
    },

    /// Removal from an associative container hit a reference that could
    /// not be compared.
    #[error("ambiguous removal from container {container_id}: unresolvable reference")]
    AmbiguousRemoval { container_id: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for container results.
pub type ContainerResult<T> = Result<T, ContainerError>;
