use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::Document;
use docmap_codec::CodecRegistry;
use docmap_store::{
    DeleteResult, FindOneAndUpdateOptions, FindOptions, InsertManyResult, InsertOneResult,
    RawCollection, UpdateResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::CollectionResult;

/// A raw collection viewed through a codec registry as values of `T`.
///
/// Filters, sorts, and updates are plain documents and refer to stored
/// attribute names (`_id` for the identifier, document names for renamed
/// fields). Handles are cheap to clone and share the raw collection.
pub struct Collection<T> {
    raw: Arc<dyn RawCollection>,
    registry: Arc<CodecRegistry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub fn new(raw: Arc<dyn RawCollection>, registry: Arc<CodecRegistry>) -> Self {
        Self {
            raw,
            registry,
            _marker: PhantomData,
        }
    }

    /// Fully qualified `database.collection` name.
    pub fn namespace(&self) -> &str {
        self.raw.namespace()
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// The same raw collection, read and written as `U`.
    ///
    /// `with_document_class::<Document>()` sees stored documents untouched.
    pub fn with_document_class<U>(&self) -> Collection<U>
    where
        U: Serialize + DeserializeOwned + 'static,
    {
        Collection::new(Arc::clone(&self.raw), Arc::clone(&self.registry))
    }

    /// The same raw collection, converted through a different registry.
    pub fn with_codec_registry(&self, registry: Arc<CodecRegistry>) -> Self {
        Self::new(Arc::clone(&self.raw), registry)
    }

    pub fn insert_one(&self, value: &T) -> CollectionResult<InsertOneResult> {
        let document = self.registry.encode(value)?;
        Ok(self.raw.insert_one(document)?)
    }

    /// Insert values in order. Encoding happens up front, so a value that
    /// fails to encode inserts nothing; a store failure stops the batch there.
    pub fn insert_many<'a, I>(&self, values: I) -> CollectionResult<InsertManyResult>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let codec = self.registry.codec::<T>()?;
        let documents = values
            .into_iter()
            .map(|value| codec.encode(value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.raw.insert_many(documents)?)
    }

    pub fn find(&self, filter: Document) -> CollectionResult<Cursor<T>> {
        self.find_with_options(filter, FindOptions::default())
    }

    pub fn find_with_options(&self, filter: Document, options: FindOptions) -> CollectionResult<Cursor<T>> {
        // Resolve the codec now so an unregistered type fails here.
        self.registry.codec::<T>()?;
        let documents = self.raw.find(&filter, &options)?;
        debug!(
            namespace = self.namespace(),
            matched = documents.len(),
            "opened cursor"
        );
        Ok(Cursor::new(documents, Arc::clone(&self.registry)))
    }

    pub fn find_one(&self, filter: Document) -> CollectionResult<Option<T>> {
        self.find_with_options(filter, FindOptions::default().limit(1))?
            .first()
    }

    pub fn count_documents(&self, filter: Document) -> CollectionResult<u64> {
        Ok(self.raw.count_documents(&filter)?)
    }

    /// Update the first match and return it decoded, before or after the
    /// update as the options say. `None` when nothing matched.
    pub fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> CollectionResult<Option<T>> {
        let codec = self.registry.codec::<T>()?;
        self.raw
            .find_one_and_update(&filter, &update, &options)?
            .map(|document| codec.decode(document))
            .transpose()
            .map_err(Into::into)
    }

    pub fn find_one_and_delete(&self, filter: Document) -> CollectionResult<Option<T>> {
        let codec = self.registry.codec::<T>()?;
        self.raw
            .find_one_and_delete(&filter)?
            .map(|document| codec.decode(document))
            .transpose()
            .map_err(Into::into)
    }

    /// Replace the first match with `value`. The stored `_id` is kept.
    pub fn replace_one(&self, filter: Document, value: &T, upsert: bool) -> CollectionResult<UpdateResult> {
        let replacement = self.registry.encode(value)?;
        Ok(self.raw.replace_one(&filter, replacement, upsert)?)
    }

    pub fn update_one(&self, filter: Document, update: Document) -> CollectionResult<UpdateResult> {
        Ok(self.raw.update_one(&filter, &update, false)?)
    }

    pub fn update_many(&self, filter: Document, update: Document) -> CollectionResult<UpdateResult> {
        Ok(self.raw.update_many(&filter, &update, false)?)
    }

    pub fn delete_one(&self, filter: Document) -> CollectionResult<DeleteResult> {
        Ok(self.raw.delete_one(&filter)?)
    }

    pub fn delete_many(&self, filter: Document) -> CollectionResult<DeleteResult> {
        Ok(self.raw.delete_many(&filter)?)
    }

    /// Remove every document. The handle stays usable.
    pub fn drop(&self) -> CollectionResult<()> {
        Ok(self.raw.drop_collection()?)
    }
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            raw: Arc::clone(&self.raw),
            registry: Arc::clone(&self.registry),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("namespace", &self.raw.namespace())
            .field("document_class", &std::any::type_name::<T>())
            .finish()
    }
}

/// One-shot iterator over query results.
///
/// Each call to `next` decodes one stored document; a document that fails
/// to decode yields an error and iteration can continue past it.
pub struct Cursor<T> {
    documents: std::vec::IntoIter<Document>,
    registry: Arc<CodecRegistry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Cursor<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn new(documents: Vec<Document>, registry: Arc<CodecRegistry>) -> Self {
        Self {
            documents: documents.into_iter(),
            registry,
            _marker: PhantomData,
        }
    }

    /// The next result, if any, consuming the cursor.
    pub fn first(mut self) -> CollectionResult<Option<T>> {
        self.next().transpose()
    }

    /// Decode everything left, stopping at the first failure.
    pub fn into_vec(self) -> CollectionResult<Vec<T>> {
        self.collect()
    }
}

impl<T> Iterator for Cursor<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    type Item = CollectionResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let document = self.documents.next()?;
        Some(self.registry.decode::<T>(document).map_err(Into::into))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.documents.size_hint()
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("remaining", &self.documents.len())
            .finish()
    }
}
