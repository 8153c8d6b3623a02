use bson::Bson;

/// Errors from raw collection operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A document with this `_id` already exists.
    #[error("duplicate key: _id {id}")]
    DuplicateKey { id: Bson },

    /// The filter document is malformed or uses an unsupported operator.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The update document is malformed or uses an unsupported operator.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// An update tried to change a field that may not change.
    #[error("field {field} is immutable")]
    ImmutableField { field: String },

    /// A lock guarding collection state was poisoned by a panicking writer.
    #[error("collection lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
