/// Errors from externalization.
///
/// Walking an object graph never fails; only the final encoding step can.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExternalizeError {
    /// The encoder rejected the externalized value.
    #[error("{format} encoding failed: {reason}")]
    Encoding { format: String, reason: String },

    /// A value that was never converted to plain data reached an encoder.
    #[error("cannot encode opaque value of type {type_name}")]
    Opaque { type_name: String },
}

/// Result alias for externalization.
pub type ExternalizeResult<T> = Result<T, ExternalizeError>;
