use holdall_types::Oid;

/// Errors from object-database operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The record exists but its data cannot be read back into an object.
    #[error("unreadable object {0}")]
    Unreadable(Oid),

    /// No state has ever been stored for the record.
    #[error("no state stored for {0}")]
    NoState(Oid),

    /// A persistent reference was compared with a value it cannot be
    /// compared with.
    #[error("persistent reference {0} is not comparable")]
    IncomparableReference(Oid),

    /// A bucket key that cannot be ordered against its neighbours.
    #[error("unorderable bucket key: {0}")]
    UnorderableKey(String),

    /// A stale write that no resolver was offered for.
    #[error("write conflict on {oid}: read serial {read}, committed serial {committed}")]
    WriteConflict {
        oid: Oid,
        read: u64,
        committed: u64,
    },

    /// Three divergent versions that cannot be merged.
    #[error("unresolvable conflict: {reason}")]
    UnresolvableConflict { reason: String },
}

/// Result alias for object-database operations.
pub type StoreResult<T> = Result<T, StoreError>;
