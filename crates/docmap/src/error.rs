use thiserror::Error;

use docmap_codec::CodecError;
use docmap_store::StoreError;

/// Errors from typed collection operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Converting between the Rust value and its document failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The underlying raw collection rejected the operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type CollectionResult<T> = Result<T, CollectionError>;
