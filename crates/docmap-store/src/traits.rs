use bson::{Bson, Document};

use crate::error::StoreResult;
use crate::options::{
    DeleteResult, FindOneAndUpdateOptions, FindOptions, InsertManyResult, InsertOneResult,
    UpdateResult,
};

/// A named collection of raw BSON documents.
///
/// All implementations must satisfy these invariants:
/// - Every stored document carries an `_id`, placed first. A document
///   inserted without one gets a fresh `ObjectId`.
/// - `_id` values are unique within a collection and never change.
/// - Filters and updates follow the operator subset evaluated by
///   [`crate::filter`] and [`crate::update`].
/// - Concurrent reads are always safe; each write is atomic on its own.
/// - The collection never interprets documents beyond `_id`, filters, and
///   updates. Type mapping happens in the layer above.
pub trait RawCollection: Send + Sync {
    /// Fully qualified `database.collection` name.
    fn namespace(&self) -> &str;

    /// Insert one document and return its `_id`.
    fn insert_one(&self, document: Document) -> StoreResult<InsertOneResult>;

    /// Insert documents in order, stopping at the first failure.
    ///
    /// Documents before the failing one stay inserted. Backends may override
    /// this to batch the writes.
    fn insert_many(&self, documents: Vec<Document>) -> StoreResult<InsertManyResult> {
        let mut inserted_ids = Vec::with_capacity(documents.len());
        for document in documents {
            inserted_ids.push(self.insert_one(document)?.inserted_id);
        }
        Ok(InsertManyResult { inserted_ids })
    }

    /// Every document matching `filter`, ordered and windowed by `options`.
    ///
    /// Without a sort, documents come back in insertion order.
    fn find(&self, filter: &Document, options: &FindOptions) -> StoreResult<Vec<Document>>;

    /// Number of documents matching `filter`.
    fn count_documents(&self, filter: &Document) -> StoreResult<u64> {
        Ok(self.find(filter, &FindOptions::default())?.len() as u64)
    }

    /// Atomically update the first match and return it.
    ///
    /// Returns `Ok(None)` when nothing matched and no upsert happened, or
    /// when an upsert inserted and the options ask for the prior version.
    fn find_one_and_update(
        &self,
        filter: &Document,
        update: &Document,
        options: &FindOneAndUpdateOptions,
    ) -> StoreResult<Option<Document>>;

    /// Atomically remove the first match and return it.
    fn find_one_and_delete(&self, filter: &Document) -> StoreResult<Option<Document>>;

    /// Apply an operator update to the first match.
    fn update_one(&self, filter: &Document, update: &Document, upsert: bool) -> StoreResult<UpdateResult>;

    /// Apply an operator update to every match.
    fn update_many(&self, filter: &Document, update: &Document, upsert: bool) -> StoreResult<UpdateResult>;

    /// Replace the first match wholesale, keeping its `_id`.
    fn replace_one(&self, filter: &Document, replacement: Document, upsert: bool) -> StoreResult<UpdateResult>;

    /// Remove the first match.
    fn delete_one(&self, filter: &Document) -> StoreResult<DeleteResult>;

    /// Remove every match.
    fn delete_many(&self, filter: &Document) -> StoreResult<DeleteResult>;

    /// Remove every document in the collection.
    fn drop_collection(&self) -> StoreResult<()>;
}

/// Filter selecting the document with this `_id`.
pub fn id_filter(id: impl Into<Bson>) -> Document {
    let mut filter = Document::new();
    filter.insert("_id", id.into());
    filter
}
