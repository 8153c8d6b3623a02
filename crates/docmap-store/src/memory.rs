use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bson::oid::ObjectId;
use bson::{Bson, Document};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::filter::{self, SortSpec};
use crate::options::{
    DeleteResult, FindOneAndUpdateOptions, FindOptions, InsertOneResult, ReturnDocument,
    UpdateResult,
};
use crate::traits::RawCollection;
use crate::update;

const ID: &str = "_id";

/// In-memory, `Vec`-backed document collection.
///
/// Intended for tests and embedding. Documents are kept in insertion order
/// behind a `RwLock`; reads clone them out, writes hold the lock for the
/// whole operation so each one is atomic.
pub struct InMemoryCollection {
    namespace: String,
    documents: RwLock<Vec<Document>>,
}

impl InMemoryCollection {
    /// Create an empty collection named `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.read().map(|docs| docs.len()).unwrap_or_default()
    }

    /// Returns `true` if the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<Document>>> {
        self.documents.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<Document>>> {
        self.documents.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new("test.collection")
    }
}

/// Indices of documents matching `filter`, in sort order if one is given.
fn matching_indices(docs: &[Document], filter: &Document, sort: Option<&Document>) -> StoreResult<Vec<usize>> {
    let mut indices = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        if filter::matches(doc, filter)? {
            indices.push(i);
        }
    }
    if let Some(sort) = sort {
        let spec = SortSpec::parse(sort)?;
        indices.sort_by(|&a, &b| spec.compare(&docs[a], &docs[b]));
    }
    Ok(indices)
}

/// Give `document` an `_id` if it lacks one and move `_id` to the front.
fn with_id(mut document: Document) -> Document {
    let id = document
        .remove(ID)
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
    let mut stored = Document::new();
    stored.insert(ID, id);
    for (key, value) in document {
        stored.insert(key, value);
    }
    stored
}

fn ensure_unique(docs: &[Document], id: &Bson) -> StoreResult<()> {
    let taken = docs
        .iter()
        .filter_map(|doc| doc.get(ID))
        .any(|existing| filter::values_equal(existing, id));
    if taken {
        return Err(StoreError::DuplicateKey { id: id.clone() });
    }
    Ok(())
}

fn id_of(document: &Document) -> Bson {
    document.get(ID).cloned().unwrap_or(Bson::Null)
}

/// Build and store the document an operator-update upsert inserts.
fn upsert_update(docs: &mut Vec<Document>, filter: &Document, update_doc: &Document) -> StoreResult<Document> {
    let mut seed = update::upsert_seed(filter)?;
    update::apply_update(&mut seed, update_doc, true)?;
    let document = with_id(seed);
    ensure_unique(docs, &id_of(&document))?;
    docs.push(document.clone());
    Ok(document)
}

impl RawCollection for InMemoryCollection {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn insert_one(&self, document: Document) -> StoreResult<InsertOneResult> {
        let document = with_id(document);
        let inserted_id = id_of(&document);
        let mut docs = self.write()?;
        ensure_unique(&docs, &inserted_id)?;
        docs.push(document);
        debug!(namespace = %self.namespace, id = %inserted_id, "inserted document");
        Ok(InsertOneResult { inserted_id })
    }

    fn find(&self, filter: &Document, options: &FindOptions) -> StoreResult<Vec<Document>> {
        let docs = self.read()?;
        let indices = matching_indices(&docs, filter, options.sort.as_ref())?;
        let skip = options.skip.unwrap_or(0) as usize;
        // A zero limit means no limit.
        let limit = options.limit.filter(|&l| l > 0).map_or(usize::MAX, |l| l as usize);
        Ok(indices
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|i| docs[i].clone())
            .collect())
    }

    fn count_documents(&self, filter: &Document) -> StoreResult<u64> {
        let docs = self.read()?;
        Ok(matching_indices(&docs, filter, None)?.len() as u64)
    }

    fn find_one_and_update(
        &self,
        filter: &Document,
        update_doc: &Document,
        options: &FindOneAndUpdateOptions,
    ) -> StoreResult<Option<Document>> {
        update::validate_update(update_doc)?;
        let mut docs = self.write()?;
        let indices = matching_indices(&docs, filter, options.sort.as_ref())?;

        if let Some(&i) = indices.first() {
            let before = docs[i].clone();
            let mut after = before.clone();
            update::apply_update(&mut after, update_doc, false)?;
            docs[i] = after.clone();
            debug!(namespace = %self.namespace, id = %id_of(&after), "updated document");
            return Ok(Some(match options.return_document {
                ReturnDocument::Before => before,
                ReturnDocument::After => after,
            }));
        }

        if !options.upsert {
            return Ok(None);
        }
        let inserted = upsert_update(&mut docs, filter, update_doc)?;
        debug!(namespace = %self.namespace, id = %id_of(&inserted), "upserted document");
        Ok(match options.return_document {
            ReturnDocument::Before => None,
            ReturnDocument::After => Some(inserted),
        })
    }

    fn find_one_and_delete(&self, filter: &Document) -> StoreResult<Option<Document>> {
        let mut docs = self.write()?;
        let removed = matching_indices(&docs, filter, None)?
            .first()
            .map(|&i| docs.remove(i));
        if let Some(doc) = &removed {
            debug!(namespace = %self.namespace, id = %id_of(doc), "deleted document");
        }
        Ok(removed)
    }

    fn update_one(&self, filter: &Document, update_doc: &Document, upsert: bool) -> StoreResult<UpdateResult> {
        update::validate_update(update_doc)?;
        let mut docs = self.write()?;
        match matching_indices(&docs, filter, None)?.first() {
            Some(&i) => {
                let mut updated = docs[i].clone();
                let modified = update::apply_update(&mut updated, update_doc, false)?;
                debug!(namespace = %self.namespace, id = %id_of(&updated), modified, "updated document");
                docs[i] = updated;
                Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_id: None,
                })
            }
            None if upsert => {
                let inserted = upsert_update(&mut docs, filter, update_doc)?;
                Ok(UpdateResult {
                    upserted_id: Some(id_of(&inserted)),
                    ..UpdateResult::default()
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }

    fn update_many(&self, filter: &Document, update_doc: &Document, upsert: bool) -> StoreResult<UpdateResult> {
        update::validate_update(update_doc)?;
        let mut docs = self.write()?;
        let indices = matching_indices(&docs, filter, None)?;
        if indices.is_empty() {
            if !upsert {
                return Ok(UpdateResult::default());
            }
            let inserted = upsert_update(&mut docs, filter, update_doc)?;
            return Ok(UpdateResult {
                upserted_id: Some(id_of(&inserted)),
                ..UpdateResult::default()
            });
        }

        // Stage every change first so a failing document leaves none applied.
        let mut staged = Vec::with_capacity(indices.len());
        for &i in &indices {
            let mut updated = docs[i].clone();
            if update::apply_update(&mut updated, update_doc, false)? {
                staged.push((i, updated));
            }
        }
        let modified_count = staged.len() as u64;
        for (i, updated) in staged {
            docs[i] = updated;
        }
        debug!(
            namespace = %self.namespace,
            matched = indices.len(),
            modified = modified_count,
            "updated documents"
        );
        Ok(UpdateResult {
            matched_count: indices.len() as u64,
            modified_count,
            upserted_id: None,
        })
    }

    fn replace_one(&self, filter: &Document, replacement: Document, upsert: bool) -> StoreResult<UpdateResult> {
        update::validate_replacement(&replacement)?;
        let mut docs = self.write()?;
        match matching_indices(&docs, filter, None)?.first() {
            Some(&i) => {
                let replaced = update::apply_replacement(&docs[i], replacement)?;
                let modified = replaced != docs[i];
                debug!(namespace = %self.namespace, id = %id_of(&replaced), modified, "replaced document");
                docs[i] = replaced;
                Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_id: None,
                })
            }
            None if upsert => {
                let mut document = replacement;
                if !document.contains_key(ID) {
                    if let Some(id) = update::upsert_seed(filter)?.remove(ID) {
                        document.insert(ID, id);
                    }
                }
                let document = with_id(document);
                let upserted_id = id_of(&document);
                ensure_unique(&docs, &upserted_id)?;
                docs.push(document);
                Ok(UpdateResult {
                    upserted_id: Some(upserted_id),
                    ..UpdateResult::default()
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }

    fn delete_one(&self, filter: &Document) -> StoreResult<DeleteResult> {
        let deleted = self.find_one_and_delete(filter)?;
        Ok(DeleteResult {
            deleted_count: u64::from(deleted.is_some()),
        })
    }

    fn delete_many(&self, filter: &Document) -> StoreResult<DeleteResult> {
        let mut docs = self.write()?;
        let indices = matching_indices(&docs, filter, None)?;
        for &i in indices.iter().rev() {
            docs.remove(i);
        }
        debug!(namespace = %self.namespace, deleted = indices.len(), "deleted documents");
        Ok(DeleteResult {
            deleted_count: indices.len() as u64,
        })
    }

    fn drop_collection(&self) -> StoreResult<()> {
        self.write()?.clear();
        debug!(namespace = %self.namespace, "dropped collection");
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCollection")
            .field("namespace", &self.namespace)
            .field("document_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::id_filter;
    use bson::doc;
    use std::sync::Arc;

    fn seeded() -> InMemoryCollection {
        let coll = InMemoryCollection::new("db.mock");
        coll.insert_many(vec![
            doc! { "_id": "a", "string": "ten", "integer": 10 },
            doc! { "_id": "b", "string": "ten", "integer": 20 },
            doc! { "_id": "c", "string": "thirty", "integer": 30 },
        ])
        .unwrap();
        coll
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.get_str("_id").unwrap()).collect()
    }

    #[test]
    fn insert_assigns_object_id_first() {
        let coll = InMemoryCollection::default();
        let result = coll.insert_one(doc! { "string": "x" }).unwrap();
        assert!(matches!(result.inserted_id, Bson::ObjectId(_)));

        let stored = coll.find(&doc! {}, &FindOptions::default()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored[0].get("_id"), Some(&result.inserted_id));
    }

    #[test]
    fn insert_moves_existing_id_to_front() {
        let coll = InMemoryCollection::default();
        coll.insert_one(doc! { "string": "x", "_id": 7 }).unwrap();
        let stored = coll.find(&doc! {}, &FindOptions::default()).unwrap();
        assert_eq!(stored[0], doc! { "_id": 7, "string": "x" });
    }

    #[test]
    fn duplicate_id_rejected() {
        let coll = seeded();
        let err = coll.insert_one(doc! { "_id": "a" }).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { id: Bson::String(ref id) } if id == "a"));
        assert_eq!(coll.len(), 3);
    }

    #[test]
    fn insert_many_stops_at_first_failure() {
        let coll = InMemoryCollection::default();
        let err = coll
            .insert_many(vec![doc! { "_id": 1 }, doc! { "_id": 1 }, doc! { "_id": 2 }])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(coll.len(), 1);
    }

    #[test]
    fn find_in_insertion_order() {
        let coll = seeded();
        let found = coll.find(&doc! { "string": "ten" }, &FindOptions::default()).unwrap();
        assert_eq!(ids(&found), ["a", "b"]);
    }

    #[test]
    fn find_sorted_and_windowed() {
        let coll = seeded();
        let options = FindOptions::default().sort(doc! { "integer": -1 }).skip(1).limit(1);
        let found = coll.find(&doc! {}, &options).unwrap();
        assert_eq!(ids(&found), ["b"]);
    }

    #[test]
    fn zero_limit_is_unbounded() {
        let coll = seeded();
        let found = coll.find(&doc! {}, &FindOptions::default().limit(0)).unwrap();
        assert_eq!(ids(&found), ["a", "b", "c"]);
        let found = coll.find(&doc! {}, &FindOptions::default().skip(1).limit(0)).unwrap();
        assert_eq!(ids(&found), ["b", "c"]);
    }

    #[test]
    fn bad_filter_propagates() {
        let coll = seeded();
        let err = coll.find(&doc! { "$where": "1" }, &FindOptions::default()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilter(_)));
    }

    #[test]
    fn count() {
        let coll = seeded();
        assert_eq!(coll.count_documents(&doc! {}).unwrap(), 3);
        assert_eq!(coll.count_documents(&doc! { "integer": { "$gte": 20 } }).unwrap(), 2);
    }

    #[test]
    fn find_one_and_update_returns_before_by_default() {
        let coll = seeded();
        let before = coll
            .find_one_and_update(
                &id_filter("a"),
                &doc! { "$set": { "integer": 11 } },
                &FindOneAndUpdateOptions::default(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(before.get_i32("integer").unwrap(), 10);

        let after = coll
            .find_one_and_update(
                &id_filter("a"),
                &doc! { "$inc": { "integer": 1 } },
                &FindOneAndUpdateOptions::default().return_document(ReturnDocument::After),
            )
            .unwrap()
            .unwrap();
        assert_eq!(after.get_i32("integer").unwrap(), 12);
    }

    #[test]
    fn find_one_and_update_respects_sort() {
        let coll = seeded();
        let updated = coll
            .find_one_and_update(
                &doc! { "string": "ten" },
                &doc! { "$set": { "picked": true } },
                &FindOneAndUpdateOptions::default()
                    .sort(doc! { "integer": -1 })
                    .return_document(ReturnDocument::After),
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.get_str("_id").unwrap(), "b");
    }

    #[test]
    fn find_one_and_update_upserts() {
        let coll = seeded();
        let options = FindOneAndUpdateOptions::default().upsert(true);
        let none = coll
            .find_one_and_update(&doc! { "string": "new" }, &doc! { "$set": { "integer": 1 } }, &options)
            .unwrap();
        assert!(none.is_none());
        assert_eq!(coll.count_documents(&doc! { "string": "new", "integer": 1 }).unwrap(), 1);

        let inserted = coll
            .find_one_and_update(
                &doc! { "_id": "z" },
                &doc! { "$set": { "integer": 2 } },
                &options.clone().return_document(ReturnDocument::After),
            )
            .unwrap()
            .unwrap();
        assert_eq!(inserted, doc! { "_id": "z", "integer": 2 });
    }

    #[test]
    fn find_one_and_update_without_match() {
        let coll = seeded();
        let result = coll
            .find_one_and_update(
                &doc! { "string": "missing" },
                &doc! { "$set": { "integer": 1 } },
                &FindOneAndUpdateOptions::default(),
            )
            .unwrap();
        assert!(result.is_none());
        assert_eq!(coll.len(), 3);
    }

    #[test]
    fn failed_update_leaves_document_alone() {
        let coll = seeded();
        let err = coll
            .find_one_and_update(
                &id_filter("a"),
                &doc! { "$set": { "integer": 99, "_id": "q" } },
                &FindOneAndUpdateOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ImmutableField { .. }));
        assert_eq!(coll.count_documents(&doc! { "_id": "a", "integer": 10 }).unwrap(), 1);
    }

    #[test]
    fn find_one_and_delete() {
        let coll = seeded();
        let removed = coll.find_one_and_delete(&doc! { "string": "ten" }).unwrap().unwrap();
        assert_eq!(removed.get_str("_id").unwrap(), "a");
        assert_eq!(coll.len(), 2);
        assert!(coll.find_one_and_delete(&doc! { "string": "nope" }).unwrap().is_none());
    }

    #[test]
    fn update_one_and_many() {
        let coll = seeded();
        let one = coll
            .update_one(&doc! { "string": "ten" }, &doc! { "$set": { "flag": 1 } }, false)
            .unwrap();
        assert_eq!((one.matched_count, one.modified_count), (1, 1));

        let many = coll
            .update_many(&doc! { "string": "ten" }, &doc! { "$set": { "flag": 1 } }, false)
            .unwrap();
        assert_eq!((many.matched_count, many.modified_count), (2, 1));
        assert_eq!(coll.count_documents(&doc! { "flag": 1 }).unwrap(), 2);

        let none = coll
            .update_many(&doc! { "string": "nope" }, &doc! { "$set": { "flag": 1 } }, false)
            .unwrap();
        assert_eq!(none, UpdateResult::default());
    }

    #[test]
    fn update_upsert_reports_id() {
        let coll = seeded();
        let result = coll
            .update_one(&doc! { "_id": "u" }, &doc! { "$set": { "integer": 5 } }, true)
            .unwrap();
        assert_eq!(result.upserted_id, Some(Bson::String("u".into())));
        assert_eq!(result.matched_count, 0);
        assert_eq!(coll.len(), 4);
    }

    #[test]
    fn update_many_is_all_or_nothing() {
        let coll = InMemoryCollection::default();
        coll.insert_many(vec![doc! { "n": 1 }, doc! { "n": "text" }]).unwrap();
        let err = coll.update_many(&doc! {}, &doc! { "$inc": { "n": 1 } }, false).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate(_)));
        assert_eq!(coll.count_documents(&doc! { "n": 1 }).unwrap(), 1);
    }

    #[test]
    fn replace_one_keeps_id() {
        let coll = seeded();
        let result = coll
            .replace_one(&id_filter("c"), doc! { "string": "replaced" }, false)
            .unwrap();
        assert_eq!(result.modified_count, 1);
        let found = coll.find(&id_filter("c"), &FindOptions::default()).unwrap();
        assert_eq!(found[0], doc! { "_id": "c", "string": "replaced" });

        let upserted = coll
            .replace_one(&id_filter("d"), doc! { "string": "fresh" }, true)
            .unwrap();
        assert_eq!(upserted.upserted_id, Some(Bson::String("d".into())));
    }

    #[test]
    fn delete_one_and_many() {
        let coll = seeded();
        assert_eq!(coll.delete_one(&id_filter("b")).unwrap().deleted_count, 1);
        assert_eq!(coll.delete_one(&id_filter("b")).unwrap().deleted_count, 0);
        assert_eq!(coll.delete_many(&doc! {}).unwrap().deleted_count, 2);
        assert!(coll.is_empty());
    }

    #[test]
    fn drop_collection_empties() {
        let coll = seeded();
        coll.drop_collection().unwrap();
        assert!(coll.is_empty());
        assert_eq!(coll.namespace(), "db.mock");
    }

    #[test]
    fn concurrent_inserts_all_land() {
        let coll = Arc::new(InMemoryCollection::default());
        std::thread::scope(|scope| {
            for t in 0..4 {
                let coll = Arc::clone(&coll);
                scope.spawn(move || {
                    for i in 0..25 {
                        coll.insert_one(doc! { "thread": t, "i": i }).unwrap();
                    }
                });
            }
        });
        assert_eq!(coll.len(), 100);
        assert_eq!(coll.count_documents(&doc! { "thread": 2 }).unwrap(), 25);
    }

    #[test]
    fn debug_shows_count() {
        let coll = seeded();
        let text = format!("{coll:?}");
        assert!(text.contains("db.mock"));
        assert!(text.contains("document_count: 3"));
    }
}
