//! In-memory document store
//!
//! Collections are insertion-ordered vectors behind a tokio `RwLock`. Filter
//! semantics match what the engine expects from a real driver, which makes
//! this store the backing for tests and the CLI.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DeleteOptions, Document, DocumentStore, Filter, Projection, StoreError, StoreResult};

/// Process-local document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a JSON object of `collection -> [documents]`
    pub fn from_json(seed: &Value) -> StoreResult<Self> {
        let Value::Object(collections) = seed else {
            return Err(StoreError::Constraint("seed must be an object of collections".into()));
        };

        let mut data = HashMap::with_capacity(collections.len());
        for (name, documents) in collections {
            let Value::Array(items) = documents else {
                return Err(StoreError::Constraint(format!(
                    "collection '{}' must be an array of documents",
                    name
                )));
            };
            let mut docs = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) if map.contains_key(super::ID_FIELD) => {
                        docs.push(Document::from_map(map.clone()));
                    }
                    _ => {
                        return Err(StoreError::Constraint(format!(
                            "every document in '{}' must be an object with an _id",
                            name
                        )))
                    }
                }
            }
            data.insert(name.clone(), docs);
        }

        Ok(Self {
            collections: RwLock::new(data),
        })
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    /// Snapshot of every collection as JSON
    pub async fn dump(&self) -> Value {
        let collections = self.collections.read().await;
        let mut names: Vec<&String> = collections.keys().collect();
        names.sort();

        let mut out = serde_json::Map::new();
        for name in names {
            let docs = collections[name].iter().cloned().map(Document::into_value).collect();
            out.insert(name.clone(), Value::Array(docs));
        }
        Value::Object(out)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: Option<&Projection>,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|d| filter.matches(d))
            .map(|d| match projection {
                Some(p) => d.project(p),
                None => d.clone(),
            })
            .collect())
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &Filter,
        _options: Option<&DeleteOptions>,
    ) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| filter.matches(d)) {
            Some(pos) => {
                docs.remove(pos);
                debug!(collection, %filter, "memory store deleted one");
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        let removed = (before - docs.len()) as u64;
        debug!(collection, %filter, removed, "memory store deleted many");
        Ok(removed)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<()> {
        let Some(id) = document.id() else {
            return Err(StoreError::Constraint(format!(
                "document inserted into '{}' has no _id",
                collection
            )));
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id().as_ref() == Some(&id)) {
            return Err(StoreError::Constraint(format!(
                "duplicate _id {} in '{}'",
                id, collection
            )));
        }
        docs.push(document);
        Ok(())
    }
}
