use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use docmap_codec::CodecRegistry;
use docmap_store::{InMemoryCollection, RawCollection, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::collection::Collection;
use crate::error::CollectionResult;

/// A named set of in-memory collections sharing one codec registry.
///
/// The registry is frozen once handed over: register every type first,
/// then build the database.
pub struct Database {
    name: String,
    registry: Arc<CodecRegistry>,
    collections: RwLock<HashMap<String, Arc<InMemoryCollection>>>,
}

impl Database {
    pub fn new(name: impl Into<String>, registry: impl Into<Arc<CodecRegistry>>) -> Self {
        Self {
            name: name.into(),
            registry: registry.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// Typed handle on collection `name`, created empty on first use.
    pub fn collection<T>(&self, name: &str) -> CollectionResult<Collection<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let existing = self
            .collections
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .get(name)
            .cloned();
        let raw = match existing {
            Some(raw) => raw,
            None => {
                let mut collections = self.collections.write().map_err(|_| StoreError::LockPoisoned)?;
                Arc::clone(collections.entry(name.to_string()).or_insert_with(|| {
                    let namespace = format!("{}.{name}", self.name);
                    debug!(namespace = %namespace, "created collection");
                    Arc::new(InMemoryCollection::new(namespace))
                }))
            }
        };
        let raw: Arc<dyn RawCollection> = raw;
        Ok(Collection::new(raw, Arc::clone(&self.registry)))
    }

    /// Names of collections created so far, sorted.
    pub fn list_collection_names(&self) -> CollectionResult<Vec<String>> {
        let collections = self.collections.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.collections.read().map(|c| c.len()).unwrap_or_default();
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("collection_count", &count)
            .finish()
    }
}
