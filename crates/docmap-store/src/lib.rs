//! Raw document collections for docmap.
//!
//! This crate is the untyped half of a collection: it stores
//! [`bson::Document`]s keyed by `_id` and evaluates Mongo-style filter,
//! sort, and update documents against them. Typed access lives one layer up,
//! in the `docmap` crate, which converts through a codec registry.
//!
//! # Query Language
//!
//! - Filters: field equality, `$eq` `$ne` `$gt` `$gte` `$lt` `$lte` `$in`
//!   `$nin` `$exists` `$not`, and the logical `$and` `$or` `$nor`
//! - Updates: `$set`, `$unset`, `$inc`, `$setOnInsert`
//! - Sorts: field names mapped to `1` or `-1`
//!
//! Dotted paths reach into embedded documents and array elements. In
//! filters, a non-numeric segment applied to an array reaches into every
//! embedded document it holds.
//!
//! # Storage Backends
//!
//! All backends implement the [`RawCollection`] trait:
//!
//! - [`InMemoryCollection`] -- `Vec`-based collection for tests and embedding
//!
//! # Design Rules
//!
//! 1. Every stored document has an `_id`, stored first, and it never changes.
//! 2. Writes are atomic per operation: a failing update leaves no trace.
//! 3. Unknown operators are errors, never silently ignored.

pub mod error;
pub mod filter;
pub mod memory;
pub mod options;
pub mod traits;
pub mod update;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryCollection;
pub use options::{
    DeleteResult, FindOneAndUpdateOptions, FindOptions, InsertManyResult, InsertOneResult,
    ReturnDocument, UpdateResult,
};
pub use traits::{id_filter, RawCollection};

pub use bson;
