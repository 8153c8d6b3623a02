/// Errors from encoding, decoding, and codec registration.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A value has neither a registered scalar codec nor a BSON mapping.
    #[error("unsupported type {type_name}: {reason}")]
    UnsupportedType {
        type_name: String,
        reason: String,
    },

    /// No codec was registered for the requested type.
    #[error("no codec registered for {type_name}")]
    CodecNotFound { type_name: String },

    /// The field table declared for a type is inconsistent.
    #[error("invalid mapping for {type_name}: {reason}")]
    InvalidMapping { type_name: String, reason: String },

    /// An identifier value cannot be stored with the declared identifier kind.
    #[error("invalid identifier: {value}")]
    InvalidIdentifier { value: String },

    /// A date-time carries more precision than a BSON date-time can hold.
    #[error("date-time {value} has sub-millisecond precision")]
    PrecisionLoss { value: String },

    /// A UUID cannot be encoded or decoded under the configured representation.
    #[error("uuid representation error: {0}")]
    UuidRepresentation(String),

    /// Serde failed to produce a document.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Serde failed to rebuild a value from a document.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Mapper configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
