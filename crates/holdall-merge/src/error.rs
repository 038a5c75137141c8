use holdall_store::StoreError;

/// Errors from conflict resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    /// Non-timestamp data changed incompatibly on both sides.
    #[error("unresolvable conflict: {reason}")]
    Unresolvable { reason: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MergeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnresolvableConflict { reason } => MergeError::Unresolvable { reason },
            other => MergeError::Store(other),
        }
    }
}

impl From<MergeError> for StoreError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Unresolvable { reason } => StoreError::UnresolvableConflict { reason },
            MergeError::Store(inner) => inner,
        }
    }
}

/// Result alias for conflict resolution.
pub type MergeResult<T> = Result<T, MergeError>;
