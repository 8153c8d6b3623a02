use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Which version of a document `find_one_and_*` returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDocument {
    /// The document as it was before the operation.
    #[default]
    Before,
    /// The document as it is after the operation.
    After,
}

/// Options for `find`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    /// Sort specification: field names mapped to `1` or `-1`.
    pub sort: Option<Document>,
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return. `0` means no limit.
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for `find_one_and_update`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    pub return_document: ReturnDocument,
    /// Insert a new document when nothing matches.
    pub upsert: bool,
    /// Picks which match is updated when several qualify.
    pub sort: Option<Document>,
}

impl FindOneAndUpdateOptions {
    pub fn return_document(mut self, return_document: ReturnDocument) -> Self {
        self.return_document = return_document;
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Outcome of a single insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertOneResult {
    /// The stored `_id`, assigned by the store when the document had none.
    pub inserted_id: Bson,
}

/// Outcome of a batch insert.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertManyResult {
    /// Stored `_id`s in insertion order.
    pub inserted_ids: Vec<Bson>,
}

/// Outcome of an update or replace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Set when an upsert inserted a new document.
    pub upserted_id: Option<Bson>,
}

/// Outcome of a delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn defaults() {
        let options = FindOneAndUpdateOptions::default();
        assert_eq!(options.return_document, ReturnDocument::Before);
        assert!(!options.upsert);
        assert!(options.sort.is_none());
        assert_eq!(FindOptions::default(), FindOptions { sort: None, skip: None, limit: None });
    }

    #[test]
    fn builders() {
        let find = FindOptions::default().sort(doc! { "a": 1 }).skip(2).limit(5);
        assert_eq!(find.skip, Some(2));
        assert_eq!(find.limit, Some(5));

        let update = FindOneAndUpdateOptions::default()
            .return_document(ReturnDocument::After)
            .upsert(true);
        assert_eq!(update.return_document, ReturnDocument::After);
        assert!(update.upsert);
    }
}
