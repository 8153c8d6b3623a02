//! Typed document collections.
//!
//! `docmap` stores serde types as BSON documents. A [`CodecRegistry`] knows
//! how each registered type maps onto a document; a [`Collection`] pairs a
//! raw collection with that registry so callers insert, query, update, and
//! delete values of their own types.
//!
//! ```ignore
//! let mut registry = CodecRegistry::default();
//! registry.add_codec_for::<Account>()?;
//! let db = Database::new("bank", registry);
//! let accounts = db.collection::<Account>("accounts")?;
//! accounts.insert_one(&account)?;
//! let rich = accounts.find(doc! { "balance": { "$gt": 1000 } })?.into_vec()?;
//! ```

pub mod collection;
pub mod database;
pub mod error;

pub use collection::{Collection, Cursor};
pub use database::Database;
pub use error::{CollectionError, CollectionResult};

// Re-export the layers below so most callers need only this crate.
pub use docmap_codec::{
    CodecError, CodecRegistry, DateTimePrecision, FieldSpec, IdKind, Mapped, MapperConfig,
    ScalarCodec, TypeMapping, UuidRepresentation, Visibility,
};
pub use docmap_store::{
    DeleteResult, FindOneAndUpdateOptions, FindOptions, InMemoryCollection, InsertManyResult,
    InsertOneResult, RawCollection, ReturnDocument, StoreError, UpdateResult,
};

pub use bson;
